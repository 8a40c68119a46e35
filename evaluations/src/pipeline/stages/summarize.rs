use common::{error::AppError, storage::types::evaluation_summary::EvaluationSummary};
use tracing::debug;

use super::super::{
    context::EvaluationContext,
    state::{EvaluationMachine, Scored, Summarized},
};
use super::map_guard_error;

/// Computes one `EvaluationSummary` per candidate model (§3, §4.E) by reading the accumulated
/// results back out of the context, mirroring the teacher's finalize stage pattern of reading
/// `ctx.summary` back out of context.
pub(crate) async fn summarize_stage(
    machine: EvaluationMachine<(), Scored>,
    ctx: &mut EvaluationContext<'_>,
) -> Result<EvaluationMachine<(), Summarized>, AppError> {
    for candidate in &ctx.candidate_models {
        let results_for_candidate: Vec<_> = ctx
            .results
            .iter()
            .filter(|result| {
                result.candidate_provider == candidate.provider && result.candidate_model == candidate.model
            })
            .cloned()
            .collect();

        let summary = EvaluationSummary::aggregate(
            ctx.evaluation.id.clone(),
            candidate.provider.clone(),
            candidate.model.clone(),
            &results_for_candidate,
            &ctx.metrics_by_result,
        );
        ctx.summaries.push(summary);
    }

    debug!(evaluation_id = %ctx.evaluation.id, candidate_count = ctx.summaries.len(), "evaluation summaries computed");

    machine
        .summarize()
        .map_err(|(_, guard)| map_guard_error("summarize", &guard))
}
