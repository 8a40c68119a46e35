use std::collections::HashSet;
use std::sync::Arc;

use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{
            evaluation::{CandidateModel, Evaluation, EvaluationSettings, EvaluationStatus},
            question_metrics::JudgeScore,
            test_dataset::TestDataset,
            test_question::TestQuestion,
            workspace::Workspace,
        },
    },
    utils::embedding::EmbeddingProvider,
};
use retrieval_pipeline::{RetrievalConfig, RetrievedChunk};
use uuid::Uuid;

use super::{
    judge::JudgeMetric,
    services::EvaluationServices,
    EvaluationPipeline,
};

struct MockServices {
    known_providers: HashSet<&'static str>,
    fail_retrieve: bool,
    fail_generate: bool,
}

impl MockServices {
    fn happy() -> Self {
        Self {
            known_providers: ["openai", "anthropic"].into_iter().collect(),
            fail_retrieve: false,
            fail_generate: false,
        }
    }

    fn failing_retrieve() -> Self {
        Self { fail_retrieve: true, ..Self::happy() }
    }
}

struct SlowServices;

#[async_trait]
impl EvaluationServices for SlowServices {
    async fn retrieve(
        &self,
        _db: &SurrealDbClient,
        _workspace: &Workspace,
        _embedding_provider: &EmbeddingProvider,
        _query_text: &str,
        _config: RetrievalConfig,
    ) -> Result<Vec<RetrievedChunk>, AppError> {
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        Ok(vec![])
    }

    async fn generate(
        &self,
        _provider: &str,
        _model: &str,
        _prompt: &str,
        _temperature: f32,
        _max_tokens: u32,
    ) -> Result<common::utils::providers::GenerationResponse, AppError> {
        Ok(common::utils::providers::GenerationResponse {
            text: "unreachable".into(),
            prompt_tokens: 0,
            completion_tokens: 0,
        })
    }

    async fn judge(
        &self,
        _judge_model: &str,
        _metric: JudgeMetric,
        _question: &TestQuestion,
        _retrieved_context: &str,
        _generated_answer: &str,
    ) -> Option<JudgeScore> {
        None
    }

    fn cost_usd(&self, _provider: &str, _model: &str, _prompt_tokens: u32, _completion_tokens: u32) -> f64 {
        0.0
    }

    fn has_provider(&self, _provider: &str) -> bool {
        true
    }
}

#[async_trait]
impl EvaluationServices for MockServices {
    async fn retrieve(
        &self,
        _db: &SurrealDbClient,
        _workspace: &Workspace,
        _embedding_provider: &EmbeddingProvider,
        _query_text: &str,
        _config: RetrievalConfig,
    ) -> Result<Vec<RetrievedChunk>, AppError> {
        if self.fail_retrieve {
            return Err(AppError::ProviderUnavailable {
                provider: "vector-index".into(),
                model: "cosine".into(),
                detail: "mock retrieve failure".into(),
            });
        }
        Ok(vec![RetrievedChunk {
            chunk_id: "chunk-1".into(),
            document_id: "doc-1".into(),
            chunk_index: 0,
            score: 0.9,
            text: "Tokio uses cooperative scheduling.".into(),
        }])
    }

    async fn generate(
        &self,
        _provider: &str,
        _model: &str,
        _prompt: &str,
        _temperature: f32,
        _max_tokens: u32,
    ) -> Result<common::utils::providers::GenerationResponse, AppError> {
        if self.fail_generate {
            return Err(AppError::ProviderUnavailable {
                provider: "candidate".into(),
                model: "mock".into(),
                detail: "mock generate failure".into(),
            });
        }
        Ok(common::utils::providers::GenerationResponse {
            text: "Tokio schedules tasks cooperatively.".into(),
            prompt_tokens: 42,
            completion_tokens: 8,
        })
    }

    async fn judge(
        &self,
        _judge_model: &str,
        _metric: JudgeMetric,
        _question: &TestQuestion,
        _retrieved_context: &str,
        _generated_answer: &str,
    ) -> Option<JudgeScore> {
        Some(JudgeScore::new(0.9, "looks right".into()))
    }

    fn cost_usd(&self, _provider: &str, _model: &str, _prompt_tokens: u32, _completion_tokens: u32) -> f64 {
        0.000123
    }

    fn has_provider(&self, provider: &str) -> bool {
        self.known_providers.contains(provider)
    }
}

async fn setup_db() -> SurrealDbClient {
    let db = SurrealDbClient::memory("evaluations_test", &Uuid::new_v4().to_string())
        .await
        .expect("in-memory db");
    db.apply_migrations().await.expect("migrations");
    db
}

fn settings() -> EvaluationSettings {
    EvaluationSettings {
        top_k: 5,
        temperature: 0.0,
        max_tokens: 256,
        similarity_threshold: None,
        worker_pool_size: 4,
    }
}

async fn seed_evaluation(db: &SurrealDbClient, expected_answer: Option<&str>) -> Evaluation {
    let workspace = Workspace::new("corpus".into(), "local-bge".into(), "bge-small".into(), 384, 500, 100)
        .create(db)
        .await
        .expect("workspace");
    let dataset = TestDataset::new(workspace.id.clone(), "smoke dataset".into())
        .create(db)
        .await
        .expect("dataset");
    TestQuestion::new(
        dataset.id.clone(),
        0,
        "How does Tokio schedule tasks?".into(),
        expected_answer.map(str::to_string),
        None,
    )
    .create(db)
    .await
    .expect("question");

    Evaluation::new(
        dataset.id,
        vec![CandidateModel { provider: "openai".into(), model: "gpt-4o-mini".into() }],
        "gpt-4o".into(),
        settings(),
    )
    .create(db)
    .await
    .expect("evaluation")
}

fn openai_client() -> Arc<Client<OpenAIConfig>> {
    Arc::new(Client::with_config(OpenAIConfig::default()))
}

#[tokio::test]
async fn evaluation_happy_path_completes_and_summarizes() {
    let db = Arc::new(setup_db().await);
    let evaluation = seed_evaluation(&db, Some("Cooperative scheduling")).await;

    let services: Arc<dyn EvaluationServices> = Arc::new(MockServices::happy());
    let pipeline = EvaluationPipeline::with_services(
        Arc::clone(&db),
        openai_client(),
        common::utils::config::AppConfig::default(),
        services,
    );

    let summaries = pipeline.run(&evaluation.id).await.expect("evaluation run succeeds");
    assert_eq!(summaries.len(), 1);
    let summary = &summaries[0];
    assert_eq!(summary.total_questions, 1);
    assert_eq!(summary.success_count, 1);
    assert_eq!(summary.failed_count, 0);
    assert!(summary.overall_score > 0.0);

    let stored = Evaluation::get(&evaluation.id, &db).await.expect("evaluation present");
    assert_eq!(stored.status, EvaluationStatus::Completed);
    assert!(stored.completed_at.is_some());
}

#[tokio::test]
async fn retrieve_failure_marks_unit_failed_but_evaluation_completes() {
    let db = Arc::new(setup_db().await);
    let evaluation = seed_evaluation(&db, None).await;

    let services: Arc<dyn EvaluationServices> = Arc::new(MockServices::failing_retrieve());
    let pipeline = EvaluationPipeline::with_services(
        Arc::clone(&db),
        openai_client(),
        common::utils::config::AppConfig::default(),
        services,
    );

    let summaries = pipeline.run(&evaluation.id).await.expect("evaluation run still completes");
    let summary = &summaries[0];
    assert_eq!(summary.total_questions, 1);
    assert_eq!(summary.success_count, 0);
    assert_eq!(summary.failed_count, 1);

    let stored = Evaluation::get(&evaluation.id, &db).await.expect("evaluation present");
    assert_eq!(stored.status, EvaluationStatus::Completed);
}

#[tokio::test]
async fn unknown_candidate_provider_fails_the_run() {
    let db = Arc::new(setup_db().await);
    let workspace = Workspace::new("corpus".into(), "local-bge".into(), "bge-small".into(), 384, 500, 100)
        .create(&db)
        .await
        .expect("workspace");
    let dataset = TestDataset::new(workspace.id, "ds".into()).create(&db).await.expect("dataset");
    TestQuestion::new(dataset.id.clone(), 0, "q".into(), None, None)
        .create(&db)
        .await
        .expect("question");
    let evaluation = Evaluation::new(
        dataset.id,
        vec![CandidateModel { provider: "does-not-exist".into(), model: "m".into() }],
        "gpt-4o".into(),
        settings(),
    )
    .create(&db)
    .await
    .expect("evaluation");

    let services: Arc<dyn EvaluationServices> = Arc::new(MockServices::happy());
    let pipeline = EvaluationPipeline::with_services(
        Arc::clone(&db),
        openai_client(),
        common::utils::config::AppConfig::default(),
        services,
    );

    let result = pipeline.run(&evaluation.id).await;
    assert!(result.is_err());

    let stored = Evaluation::get(&evaluation.id, &db).await.expect("evaluation present");
    assert_eq!(stored.status, EvaluationStatus::Failed);
}

/// §8 scenario 6: deleting the parent Workspace mid-run cancels in-flight units and fails the
/// Evaluation with a cancellation reason, instead of hanging or silently completing.
#[tokio::test]
async fn workspace_deletion_mid_run_cancels_the_evaluation() {
    let db = Arc::new(setup_db().await);
    let evaluation = seed_evaluation(&db, None).await;
    let dataset = TestDataset::get(&evaluation.dataset_id, &db).await.expect("dataset");
    let workspace_id = dataset.workspace_id.clone();

    let services: Arc<dyn EvaluationServices> = Arc::new(SlowServices);
    let pipeline = Arc::new(EvaluationPipeline::with_services(
        Arc::clone(&db),
        openai_client(),
        common::utils::config::AppConfig::default(),
        services,
    ));

    let eval_id = evaluation.id.clone();
    let run_handle = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move { pipeline.run(&eval_id).await })
    };

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    Workspace::delete_cascade(&workspace_id, &db).await.expect("delete workspace");

    let result = tokio::time::timeout(std::time::Duration::from_secs(2), run_handle)
        .await
        .expect("evaluation cancels within the bounded window")
        .expect("task joins");
    assert!(result.is_err());

    let stored = Evaluation::get(&evaluation.id, &db).await.expect("evaluation present");
    assert_eq!(stored.status, EvaluationStatus::Failed);
    assert!(stored.error_message.as_deref().unwrap_or_default().contains("deleted"));
}

