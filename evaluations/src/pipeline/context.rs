use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{
            evaluation::{CandidateModel, Evaluation, EvaluationSettings},
            evaluation_summary::EvaluationSummary,
            model_result::ModelResult,
            question_metrics::QuestionMetrics,
            test_dataset::TestDataset,
            test_question::TestQuestion,
            workspace::Workspace,
        },
    },
    utils::embedding::EmbeddingProvider,
};
use tokio::task::JoinHandle;
use tracing::error;

use super::{services::EvaluationServices, unit::UnitOutcome};

/// Threads the in-flight state of one evaluation run through the pipeline stages (mirrors
/// `ingestion_pipeline::pipeline::context::PipelineContext`).
pub struct EvaluationContext<'a> {
    pub evaluation: &'a Evaluation,
    pub db: Arc<SurrealDbClient>,
    pub services: Arc<dyn EvaluationServices>,
    pub embedding_provider: Arc<EmbeddingProvider>,

    pub candidate_models: Vec<CandidateModel>,
    pub judge_model: String,
    pub settings: EvaluationSettings,

    pub workspace: Option<Workspace>,
    pub dataset: Option<TestDataset>,
    pub questions: Vec<TestQuestion>,

    pub unit_handles: Vec<JoinHandle<UnitOutcome>>,
    pub results: Vec<ModelResult>,
    pub metrics_by_result: HashMap<String, QuestionMetrics>,
    pub summaries: Vec<EvaluationSummary>,

    /// Set by the dispatch-stage watcher when the evaluation's Workspace disappears mid-run
    /// (§4.A "Deleting a Workspace or Evaluation during execution MUST cause in-flight units for
    /// that resource to be cancelled at the next suspension point").
    pub cancelled: Arc<AtomicBool>,
    /// Tells the watcher to stop polling once `score_stage` has collected every unit normally.
    pub watcher_stop: Arc<AtomicBool>,
    pub watcher_handle: Option<JoinHandle<()>>,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(
        evaluation: &'a Evaluation,
        db: Arc<SurrealDbClient>,
        services: Arc<dyn EvaluationServices>,
        embedding_provider: Arc<EmbeddingProvider>,
    ) -> Self {
        Self {
            evaluation,
            db,
            services,
            embedding_provider,
            candidate_models: evaluation.candidate_models.clone(),
            judge_model: evaluation.judge_model.clone(),
            settings: evaluation.settings.clone(),
            workspace: None,
            dataset: None,
            questions: Vec::new(),
            unit_handles: Vec::new(),
            results: Vec::new(),
            metrics_by_result: HashMap::new(),
            summaries: Vec::new(),
            cancelled: Arc::new(AtomicBool::new(false)),
            watcher_stop: Arc::new(AtomicBool::new(false)),
            watcher_handle: None,
        }
    }

    pub fn workspace(&self) -> Result<&Workspace, AppError> {
        self.workspace
            .as_ref()
            .ok_or_else(|| AppError::InternalError("workspace expected to be loaded".into()))
    }

    pub fn abort(&mut self, err: AppError) -> AppError {
        error!(evaluation_id = %self.evaluation.id, error = %err, "evaluation pipeline aborted");
        err
    }
}
