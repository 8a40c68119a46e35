mod dispatch_units;
mod finalize;
mod load_dataset;
mod score;
mod summarize;

pub(crate) use dispatch_units::dispatch_units_stage;
pub(crate) use finalize::finalize_stage;
pub(crate) use load_dataset::load_dataset_stage;
pub(crate) use score::score_stage;
pub(crate) use summarize::summarize_stage;

use common::error::AppError;
use state_machines::core::GuardError;

pub(crate) fn map_guard_error(event: &str, guard: &GuardError) -> AppError {
    AppError::InternalError(format!("invalid evaluation pipeline transition during {event}: {guard:?}"))
}
