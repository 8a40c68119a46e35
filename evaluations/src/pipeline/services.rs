use async_trait::async_trait;
use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{test_question::TestQuestion, question_metrics::JudgeScore, workspace::Workspace},
    },
    utils::{embedding::EmbeddingProvider, providers::{GenerationRequest, GenerationResponse, ProviderRegistry}},
};
use retrieval_pipeline::{join_context, retrieve, RetrievalConfig, RetrievedChunk};
use tracing::warn;

use super::judge::{build_prompt, parse_score, score_schema, JudgeMetric};

/// Generation timeout (§5: "generate: 120 s").
const GENERATE_TIMEOUT_SECS: u64 = 120;
/// Judge call timeout (§5: "judge call: 60 s").
const JUDGE_TIMEOUT_SECS: u64 = 60;
/// Judge calls always target this provider; `Evaluation.judge_model` names the model only, and
/// the system does not expose a user-selectable judge provider (§1 "no user-defined judge
/// prompts") — resolved here in favor of a single well-known judge backend.
const JUDGE_PROVIDER: &str = "openai";
/// At most one retry of a judge call is spent recovering from a parse failure, keeping the total
/// provider-invocation count for a single metric within the §8 "at most 3 provider invocations"
/// bound even though network-level retries are also applied underneath by the registry.
const JUDGE_PARSE_RETRIES: u8 = 2;

pub fn judge_provider() -> &'static str {
    JUDGE_PROVIDER
}

/// Abstracts the three capability calls a unit makes, so the worker-pool/fan-out orchestration in
/// `pipeline::unit` can be tested against a mock (mirrors `ingestion_pipeline::pipeline::services::PipelineServices`).
#[async_trait]
pub trait EvaluationServices: Send + Sync {
    async fn retrieve(
        &self,
        db: &SurrealDbClient,
        workspace: &Workspace,
        embedding_provider: &EmbeddingProvider,
        query_text: &str,
        config: RetrievalConfig,
    ) -> Result<Vec<RetrievedChunk>, AppError>;

    async fn generate(
        &self,
        provider: &str,
        model: &str,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<GenerationResponse, AppError>;

    async fn judge(
        &self,
        judge_model: &str,
        metric: JudgeMetric,
        question: &TestQuestion,
        retrieved_context: &str,
        generated_answer: &str,
    ) -> Option<JudgeScore>;

    fn cost_usd(&self, provider: &str, model: &str, prompt_tokens: u32, completion_tokens: u32) -> f64;

    fn has_provider(&self, provider: &str) -> bool;
}

pub struct DefaultEvaluationServices {
    registry: ProviderRegistry,
}

impl DefaultEvaluationServices {
    pub fn new(registry: ProviderRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl EvaluationServices for DefaultEvaluationServices {
    async fn retrieve(
        &self,
        db: &SurrealDbClient,
        workspace: &Workspace,
        embedding_provider: &EmbeddingProvider,
        query_text: &str,
        config: RetrievalConfig,
    ) -> Result<Vec<RetrievedChunk>, AppError> {
        retrieve(db, embedding_provider, workspace, query_text, config).await
    }

    async fn generate(
        &self,
        provider: &str,
        model: &str,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<GenerationResponse, AppError> {
        let request = GenerationRequest {
            model: model.to_string(),
            system: None,
            prompt: prompt.to_string(),
            temperature,
            max_tokens,
            timeout_secs: GENERATE_TIMEOUT_SECS,
            json_schema: None,
        };
        self.registry.generate(provider, request).await
    }

    async fn judge(
        &self,
        judge_model: &str,
        metric: JudgeMetric,
        question: &TestQuestion,
        retrieved_context: &str,
        generated_answer: &str,
    ) -> Option<JudgeScore> {
        let prompt = build_prompt(metric, question, retrieved_context, generated_answer);
        let schema = score_schema();

        for attempt in 1..=(JUDGE_PARSE_RETRIES + 1) {
            let request = GenerationRequest {
                model: judge_model.to_string(),
                system: None,
                prompt: prompt.clone(),
                temperature: 0.0,
                max_tokens: 512,
                timeout_secs: JUDGE_TIMEOUT_SECS,
                json_schema: Some(schema.clone()),
            };

            match self.registry.generate(JUDGE_PROVIDER, request).await {
                Ok(response) => {
                    if let Some(score) = parse_score(&response.text) {
                        return Some(score);
                    }
                    warn!(metric = metric.label(), attempt, "judge response failed to parse as a structured score");
                }
                Err(err) => {
                    warn!(metric = metric.label(), attempt, error = %err, "judge call failed");
                    return None;
                }
            }
        }

        None
    }

    fn cost_usd(&self, provider: &str, model: &str, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        self.registry.cost_usd(provider, model, prompt_tokens, completion_tokens)
    }

    fn has_provider(&self, provider: &str) -> bool {
        self.registry.has_provider(provider)
    }
}
