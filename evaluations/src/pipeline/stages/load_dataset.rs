use common::{
    error::AppError,
    storage::types::{test_dataset::TestDataset, test_question::TestQuestion, workspace::Workspace},
};
use tracing::debug;

use super::super::{
    context::EvaluationContext,
    services::judge_provider,
    state::{DatasetLoaded, EvaluationMachine, Ready},
};
use super::map_guard_error;

/// Validates the evaluation's setup before any provider is called (§4.E "unrecoverable setup
/// condition" cases: unreadable dataset, unknown candidate model, missing judge credential) —
/// same validate-before-dispatch shape as the teacher's slice/window resolution stage.
pub(crate) async fn load_dataset_stage(
    machine: EvaluationMachine<(), Ready>,
    ctx: &mut EvaluationContext<'_>,
) -> Result<EvaluationMachine<(), DatasetLoaded>, AppError> {
    let dataset = TestDataset::get(&ctx.evaluation.dataset_id, &ctx.db).await?;
    let questions = TestQuestion::list_for_dataset(&dataset.id, &ctx.db).await?;
    if questions.is_empty() {
        return Err(AppError::InputInvalid(format!("dataset {} has no questions", dataset.id)));
    }
    let workspace = Workspace::get(&dataset.workspace_id, &ctx.db).await?;

    for candidate in &ctx.candidate_models {
        if !ctx.services.has_provider(&candidate.provider) {
            return Err(AppError::ProviderAuth {
                provider: candidate.provider.clone(),
                model: candidate.model.clone(),
                detail: "candidate provider has no configured credential".to_string(),
            });
        }
    }
    if !ctx.services.has_provider(judge_provider()) {
        return Err(AppError::ProviderAuth {
            provider: judge_provider().to_string(),
            model: ctx.judge_model.clone(),
            detail: "judge provider has no configured credential".to_string(),
        });
    }

    debug!(
        evaluation_id = %ctx.evaluation.id,
        question_count = questions.len(),
        candidate_count = ctx.candidate_models.len(),
        "evaluation dataset loaded"
    );

    ctx.dataset = Some(dataset);
    ctx.questions = questions;
    ctx.workspace = Some(workspace);

    machine
        .load_dataset()
        .map_err(|(_, guard)| map_guard_error("load_dataset", &guard))
}
