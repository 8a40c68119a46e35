use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{error::AppError, storage::types::workspace::Workspace};
use tokio::sync::Semaphore;
use tracing::debug;

use super::super::{
    context::EvaluationContext,
    state::{DatasetLoaded, EvaluationMachine, UnitsDispatched},
    unit::run_unit,
};
use super::map_guard_error;

/// Dispatches one task per `(question, candidate)` unit, gated by a bounded semaphore (default 8,
/// `EvaluationConfig::worker_pool_size`; §5 "bounded worker pool"). Each task acquires its permit
/// before any provider call and releases it on drop, the same lease idiom used elsewhere in this
/// codebase for pooled resources. Units are not awaited here — `score_stage` is the barrier.
pub(crate) async fn dispatch_units_stage(
    machine: EvaluationMachine<(), DatasetLoaded>,
    ctx: &mut EvaluationContext<'_>,
) -> Result<EvaluationMachine<(), UnitsDispatched>, AppError> {
    let workspace = ctx.workspace()?.clone();
    let semaphore = Arc::new(Semaphore::new(ctx.settings.worker_pool_size.max(1)));
    let mut handles = Vec::with_capacity(ctx.questions.len() * ctx.candidate_models.len());

    for (question_index, question) in ctx.questions.iter().enumerate() {
        for candidate in &ctx.candidate_models {
            let permit_gate = Arc::clone(&semaphore);
            let evaluation_id = ctx.evaluation.id.clone();
            let question = question.clone();
            let candidate = candidate.clone();
            let judge_model = ctx.judge_model.clone();
            let top_k = ctx.settings.top_k;
            let similarity_threshold = ctx.settings.similarity_threshold;
            let temperature = ctx.settings.temperature;
            let max_tokens = ctx.settings.max_tokens;
            let workspace = workspace.clone();
            let embedding_provider = Arc::clone(&ctx.embedding_provider);
            let services = Arc::clone(&ctx.services);
            let db = Arc::clone(&ctx.db);

            handles.push(tokio::spawn(async move {
                let _permit = permit_gate.acquire_owned().await.expect("worker pool semaphore never closed");
                run_unit(
                    evaluation_id,
                    question_index,
                    question,
                    candidate,
                    judge_model,
                    top_k,
                    similarity_threshold,
                    temperature,
                    max_tokens,
                    workspace,
                    embedding_provider,
                    services,
                    db,
                )
                .await
            }));
        }
    }

    debug!(
        evaluation_id = %ctx.evaluation.id,
        unit_count = handles.len(),
        worker_pool_size = ctx.settings.worker_pool_size,
        "evaluation units dispatched"
    );

    let abort_handles: Vec<_> = handles.iter().map(tokio::task::JoinHandle::abort_handle).collect();
    ctx.watcher_handle = Some(spawn_cancellation_watcher(
        workspace.id.clone(),
        Arc::clone(&ctx.db),
        Arc::clone(&ctx.watcher_stop),
        Arc::clone(&ctx.cancelled),
        abort_handles,
    ));
    ctx.unit_handles = handles;

    machine
        .dispatch_units()
        .map_err(|(_, guard)| map_guard_error("dispatch_units", &guard))
}

/// Polls the Workspace every 250ms until it's gone (or `stop` is raised by `score_stage` once
/// every unit has been collected normally). A deleted Workspace aborts every still-running unit
/// task at its next suspension point and flips `cancelled` so `score_stage` can fail the run.
fn spawn_cancellation_watcher(
    workspace_id: String,
    db: Arc<common::storage::db::SurrealDbClient>,
    stop: Arc<std::sync::atomic::AtomicBool>,
    cancelled: Arc<std::sync::atomic::AtomicBool>,
    abort_handles: Vec<tokio::task::AbortHandle>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if stop.load(Ordering::Relaxed) {
                return;
            }
            if matches!(Workspace::get(&workspace_id, &db).await, Err(AppError::NotFound(_))) {
                cancelled.store(true, Ordering::Relaxed);
                for handle in &abort_handles {
                    handle.abort();
                }
                return;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    })
}
