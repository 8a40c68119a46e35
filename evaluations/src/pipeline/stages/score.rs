use std::sync::atomic::Ordering;

use common::error::AppError;
use tracing::debug;

use super::super::{
    context::EvaluationContext,
    state::{EvaluationMachine, Scored, UnitsDispatched},
};
use super::map_guard_error;

/// Barrier stage: awaits every dispatched unit and folds its `ModelResult`/`QuestionMetrics` into
/// the context, since aggregation in `summarize_stage` needs the full set (§4.E). A unit aborted
/// by the cancellation watcher surfaces as a cancelled `JoinError`, which is swallowed here (its
/// `ModelResult` was never persisted) rather than treated as a fatal join failure; the overall
/// run still fails afterward once `cancelled` is observed.
pub(crate) async fn score_stage(
    machine: EvaluationMachine<(), UnitsDispatched>,
    ctx: &mut EvaluationContext<'_>,
) -> Result<EvaluationMachine<(), Scored>, AppError> {
    let handles = std::mem::take(&mut ctx.unit_handles);

    for handle in handles {
        match handle.await {
            Ok(outcome) => {
                if let Some(metrics) = outcome.metrics {
                    ctx.metrics_by_result.insert(outcome.model_result.id.clone(), metrics);
                }
                ctx.results.push(outcome.model_result);
            }
            Err(join_err) if join_err.is_cancelled() => continue,
            Err(join_err) => return Err(AppError::from(join_err)),
        }
    }

    ctx.watcher_stop.store(true, Ordering::Relaxed);
    if let Some(handle) = ctx.watcher_handle.take() {
        let _ = handle.await;
    }
    if ctx.cancelled.load(Ordering::Relaxed) {
        return Err(AppError::Cancelled(format!(
            "workspace for evaluation {} was deleted mid-run",
            ctx.evaluation.id
        )));
    }

    debug!(evaluation_id = %ctx.evaluation.id, unit_count = ctx.results.len(), "evaluation units scored");

    machine
        .score()
        .map_err(|(_, guard)| map_guard_error("score", &guard))
}
