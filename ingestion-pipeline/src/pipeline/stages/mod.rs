use state_machines::core::GuardError;
use tracing::{debug, instrument};

use common::error::AppError;

use super::{
    context::PipelineContext,
    state::{Chunked, Embedded, Extracted, IngestionMachine, Persisted, Ready},
};

#[instrument(level = "trace", skip_all, fields(document_id = %ctx.document.id))]
pub async fn extract_stage(
    machine: IngestionMachine<(), Ready>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), Extracted>, AppError> {
    let text = ctx.services.extract_text(&ctx.document).await?;

    debug!(
        document_id = %ctx.document.id,
        chars = text.chars().count(),
        "document text extracted"
    );

    ctx.extracted_text = Some(text);

    machine
        .extract()
        .map_err(|(_, guard)| map_guard_error("extract", &guard))
}

#[instrument(level = "trace", skip_all, fields(document_id = %ctx.document.id))]
pub async fn chunk_stage(
    machine: IngestionMachine<(), Extracted>,
    ctx: &mut PipelineContext<'_>,
    chunk_size_tokens: usize,
    chunk_overlap_tokens: usize,
) -> Result<IngestionMachine<(), Chunked>, AppError> {
    let text = ctx.extracted_text()?;
    let chunks = ctx.services.chunk(text, chunk_size_tokens, chunk_overlap_tokens)?;

    if chunks.is_empty() {
        return Err(AppError::ExtractEmpty(ctx.document.id.clone()));
    }

    debug!(
        document_id = %ctx.document.id,
        chunk_count = chunks.len(),
        "document chunked"
    );

    ctx.chunk_candidates = chunks;

    machine
        .chunk()
        .map_err(|(_, guard)| map_guard_error("chunk", &guard))
}

#[instrument(level = "trace", skip_all, fields(document_id = %ctx.document.id))]
pub async fn embed_stage(
    machine: IngestionMachine<(), Chunked>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), Embedded>, AppError> {
    let tuning = &ctx.pipeline_config.tuning;
    let candidates = std::mem::take(&mut ctx.chunk_candidates);

    let embedded = ctx
        .services
        .embed_batch(
            candidates,
            ctx.embedding_provider,
            tuning.embed_batch_size,
            std::time::Duration::from_secs(tuning.embed_batch_timeout_secs),
        )
        .await?;

    debug!(
        document_id = %ctx.document.id,
        embedded_count = embedded.len(),
        "chunks embedded"
    );

    ctx.embedded_chunks = embedded;

    machine
        .embed()
        .map_err(|(_, guard)| map_guard_error("embed", &guard))
}

#[instrument(level = "trace", skip_all, fields(document_id = %ctx.document.id))]
pub async fn persist_stage(
    machine: IngestionMachine<(), Embedded>,
    ctx: &mut PipelineContext<'_>,
    workspace_id: &str,
    expected_dimension: usize,
) -> Result<IngestionMachine<(), Persisted>, AppError> {
    let embedded_chunks = std::mem::take(&mut ctx.embedded_chunks);
    let total_chunks = ctx
        .services
        .persist(&ctx.document.id, workspace_id, expected_dimension, embedded_chunks)
        .await?;

    debug!(
        document_id = %ctx.document.id,
        total_chunks,
        "document persisted"
    );

    machine
        .persist()
        .map_err(|(_, guard)| map_guard_error("persist", &guard))
}

fn map_guard_error(event: &str, guard: &GuardError) -> AppError {
    AppError::InternalError(format!(
        "invalid ingestion pipeline transition during {event}: {guard:?}"
    ))
}
