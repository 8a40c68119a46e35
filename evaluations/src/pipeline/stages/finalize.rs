use common::error::AppError;
use tracing::info;

use super::super::{
    context::EvaluationContext,
    state::{Completed, EvaluationMachine, Summarized},
};
use super::map_guard_error;

/// Persists the computed summaries and flips `Evaluation.status` to `completed` (§4.E). Per-unit
/// failures never reach here as an error — only an unrecoverable setup condition caught earlier
/// in `load_dataset_stage` fails the whole run; a run with some failed units still completes.
pub(crate) async fn finalize_stage(
    machine: EvaluationMachine<(), Summarized>,
    ctx: &mut EvaluationContext<'_>,
) -> Result<EvaluationMachine<(), Completed>, AppError> {
    let summaries = std::mem::take(&mut ctx.summaries);
    let mut stored = Vec::with_capacity(summaries.len());
    for summary in summaries {
        stored.push(summary.create(&ctx.db).await?);
    }
    ctx.summaries = stored;

    ctx.evaluation.mark_completed(&ctx.db).await?;

    let total_units: usize = ctx.results.len();
    let failed_units = ctx.results.iter().filter(|r| !r.is_success()).count();
    info!(
        evaluation_id = %ctx.evaluation.id,
        total_units,
        failed_units,
        "evaluation completed"
    );

    machine
        .finalize()
        .map_err(|(_, guard)| map_guard_error("finalize", &guard))
}
