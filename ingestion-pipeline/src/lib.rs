#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod pipeline;
pub mod utils;

pub use pipeline::{IngestionConfig, IngestionPipeline, IngestionTuning};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::error;

/// Polls for ready ingestion tasks and drives them one at a time, backing off when the queue is
/// empty (§4.D, §5). A failed task that still `can_retry()` is simply left claimable again; the
/// next poll picks it back up.
pub async fn run_worker_loop(
    ingestion_pipeline: Arc<IngestionPipeline>,
) -> Result<(), Box<dyn std::error::Error>> {
    let idle_backoff = Duration::from_millis(500);

    loop {
        match ingestion_pipeline.poll_and_process().await {
            Ok(true) => {}
            Ok(false) => sleep(idle_backoff).await,
            Err(err) => {
                error!(error = %err, "ingestion task failed");
            }
        }
    }
}
