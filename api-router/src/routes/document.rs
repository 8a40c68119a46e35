use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use common::{
    error::AppError,
    storage::types::{document::{Document, DocumentStatus}, ingestion_task::IngestionTask},
};

use crate::{api_state::ApiState, error::ApiError};

/// Route: POST /rag/{document_id}/process (§6). Re-drives a `pending` or `failed` Document by
/// enqueueing a fresh `IngestionTask`; the worker's `process_task` performs the actual
/// `start_processing` CAS and wipes derived state for a re-drive, so a document already
/// `processing` or `completed` is rejected there, not here.
pub async fn reprocess_document(
    State(state): State<ApiState>,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let document = Document::get(&document_id, &state.db).await?;

    if !matches!(document.status, DocumentStatus::Pending | DocumentStatus::Failed) {
        return Err(ApiError::from(AppError::StateConflict(format!(
            "document {document_id} is {:?}, cannot re-drive",
            document.status
        ))));
    }

    let task = IngestionTask::new(document_id).create(&state.db).await?;

    Ok(Json(task))
}
