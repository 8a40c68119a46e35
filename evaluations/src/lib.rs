#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod pipeline;

pub use pipeline::{DefaultEvaluationServices, EvaluationPipeline, EvaluationServices};

use std::sync::Arc;
use tracing::error;

/// Fires `pipeline.run(evaluation_id)` as a detached background task (§5 "background tasks
/// independent of the request that triggered them"); callers (the API handler that created the
/// evaluation) don't await this.
pub fn spawn_run(pipeline: Arc<EvaluationPipeline>, evaluation_id: String) {
    tokio::spawn(async move {
        if let Err(err) = pipeline.run(&evaluation_id).await {
            error!(evaluation_id = %evaluation_id, error = %err, "evaluation run failed");
        }
    });
}
