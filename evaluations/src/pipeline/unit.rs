use std::sync::Arc;
use std::time::Instant;

use common::{
    storage::{
        db::SurrealDbClient,
        types::{
            evaluation::CandidateModel,
            model_result::ModelResult,
            question_metrics::{JudgeScore, QuestionMetrics},
            test_question::TestQuestion,
            workspace::Workspace,
        },
    },
    utils::embedding::EmbeddingProvider,
};
use retrieval_pipeline::{join_context, RetrievalConfig};
use tracing::warn;

use super::{
    judge::JudgeMetric,
    services::EvaluationServices,
};

/// One `(question, candidate)` unit's persisted outputs, handed back across the worker-pool
/// boundary to be folded into the evaluation's aggregate (§4.E).
pub struct UnitOutcome {
    pub model_result: ModelResult,
    pub metrics: Option<QuestionMetrics>,
}

/// Runs retrieve → generate → 4 parallel judge calls for one unit and persists its rows as it
/// completes (§4.E). Never returns `Err`: every failure mode is captured as a failed `ModelResult`
/// so the worker pool can keep going without a unit poisoning the evaluation.
#[allow(clippy::too_many_arguments)]
pub async fn run_unit(
    evaluation_id: String,
    question_index: usize,
    question: TestQuestion,
    candidate: CandidateModel,
    judge_model: String,
    top_k: usize,
    similarity_threshold: Option<f32>,
    temperature: f32,
    max_tokens: u32,
    workspace: Workspace,
    embedding_provider: Arc<EmbeddingProvider>,
    services: Arc<dyn EvaluationServices>,
    db: Arc<SurrealDbClient>,
) -> UnitOutcome {
    let retrieval_config = RetrievalConfig { top_k, similarity_threshold };

    let retrieved = match services
        .retrieve(&db, &workspace, &embedding_provider, &question.question_text, retrieval_config)
        .await
    {
        Ok(chunks) => chunks,
        Err(err) => return fail(&evaluation_id, question_index, &question, &candidate, err.to_string(), &db).await,
    };
    let retrieved_context = join_context(&retrieved);

    let prompt = format!(
        "Context: {retrieved_context}\n\nQuestion: {question}\n\nAnswer:",
        retrieved_context = retrieved_context,
        question = question.question_text,
    );

    let started = Instant::now();
    let generation = services
        .generate(&candidate.provider, &candidate.model, &prompt, temperature, max_tokens)
        .await;
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let generation = match generation {
        Ok(response) => response,
        Err(err) => return fail(&evaluation_id, question_index, &question, &candidate, err.to_string(), &db).await,
    };

    let cost_usd = services.cost_usd(
        &candidate.provider,
        &candidate.model,
        generation.prompt_tokens,
        generation.completion_tokens,
    );

    let model_result = ModelResult::success(
        evaluation_id.clone(),
        question.id.clone(),
        question_index,
        candidate.provider.clone(),
        candidate.model.clone(),
        generation.text.clone(),
        retrieved_context.clone(),
        latency_ms,
        cost_usd,
        generation.prompt_tokens,
        generation.completion_tokens,
    );
    let model_result = match model_result.create(&db).await {
        Ok(stored) => stored,
        Err(err) => {
            warn!(error = %err, "failed to persist model result");
            return UnitOutcome { model_result: ModelResult::failure(
                evaluation_id, question.id.clone(), question_index,
                candidate.provider.clone(), candidate.model.clone(), err.to_string(),
            ), metrics: None };
        }
    };

    let has_expected_answer = question.expected_answer.is_some();
    let (accuracy, faithfulness, reasoning, context_utilization) = futures::join!(
        judge_if(has_expected_answer, services.as_ref(), &judge_model, JudgeMetric::Accuracy, &question, &retrieved_context, &generation.text),
        services.judge(&judge_model, JudgeMetric::Faithfulness, &question, &retrieved_context, &generation.text),
        services.judge(&judge_model, JudgeMetric::Reasoning, &question, &retrieved_context, &generation.text),
        services.judge(&judge_model, JudgeMetric::ContextUtilization, &question, &retrieved_context, &generation.text),
    );

    let question_metrics = QuestionMetrics::new(model_result.id.clone(), accuracy, faithfulness, reasoning, context_utilization);
    let metrics = match question_metrics.create(&db).await {
        Ok(stored) => Some(stored),
        Err(err) => {
            warn!(error = %err, "failed to persist question metrics");
            None
        }
    };

    UnitOutcome { model_result, metrics }
}

async fn judge_if(
    should_run: bool,
    services: &dyn EvaluationServices,
    judge_model: &str,
    metric: JudgeMetric,
    question: &TestQuestion,
    retrieved_context: &str,
    generated_answer: &str,
) -> Option<JudgeScore> {
    if !should_run {
        return None;
    }
    services.judge(judge_model, metric, question, retrieved_context, generated_answer).await
}

async fn fail(
    evaluation_id: &str,
    question_index: usize,
    question: &TestQuestion,
    candidate: &CandidateModel,
    error: String,
    db: &SurrealDbClient,
) -> UnitOutcome {
    let model_result = ModelResult::failure(
        evaluation_id.to_string(),
        question.id.clone(),
        question_index,
        candidate.provider.clone(),
        candidate.model.clone(),
        error,
    );
    let model_result = match model_result.create(db).await {
        Ok(stored) => stored,
        Err(create_err) => {
            warn!(error = %create_err, "failed to persist failed model result");
            model_result
        }
    };
    UnitOutcome { model_result, metrics: None }
}
