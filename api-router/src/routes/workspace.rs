use std::io::Read;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use axum_typed_multipart::{FieldData, TryFromMultipart, TypedMultipart};
use common::storage::types::{document::Document, ingestion_task::IngestionTask, workspace::Workspace};
use serde::Deserialize;
use serde_json::json;
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct CreateWorkspaceRequest {
    pub name: String,
    pub embedding_provider: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub chunk_size_tokens: usize,
    pub chunk_overlap_tokens: usize,
}

/// Route: POST /workspace/create (§6).
pub async fn create_workspace(
    State(state): State<ApiState>,
    Json(input): Json<CreateWorkspaceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let workspace = Workspace::new(
        input.name,
        input.embedding_provider,
        input.embedding_model,
        input.embedding_dimension,
        input.chunk_size_tokens,
        input.chunk_overlap_tokens,
    )
    .create(&state.db)
    .await?;

    Ok(Json(workspace))
}

#[derive(Debug, TryFromMultipart)]
pub struct UploadRequest {
    #[form_data(limit = "unlimited")]
    pub file: FieldData<NamedTempFile>,
}

/// Route: POST /workspace/{id}/upload (§6). Stores the uploaded bytes, creates a `Document` row
/// in `pending`, and enqueues an `IngestionTask` to drive it asynchronously.
pub async fn upload_document(
    State(state): State<ApiState>,
    Path(workspace_id): Path<String>,
    TypedMultipart(input): TypedMultipart<UploadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Touch the workspace first so an unknown id surfaces as 404 before we write anything.
    Workspace::get(&workspace_id, &state.db).await?;

    let content_type = input
        .file
        .metadata
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let mut bytes = Vec::new();
    input
        .file
        .contents
        .as_file()
        .try_clone()
        .and_then(|mut f| f.read_to_end(&mut bytes))
        .map_err(|err| common::error::AppError::InputInvalid(format!("failed to read upload: {err}")))?;

    let location = format!("{workspace_id}/{}", Uuid::new_v4());
    state
        .storage
        .put(&location, bytes.into())
        .await
        .map_err(common::error::AppError::Storage)?;

    let document = Document::new(workspace_id, location, content_type)
        .create(&state.db)
        .await?;

    IngestionTask::new(document.id.clone()).create(&state.db).await?;

    Ok(Json(document))
}

/// Route: listing helper backing workspace detail views — not in spec §6's table, but a thin
/// read used by /rag/{document_id}/process to resolve a document's workspace.
pub async fn list_documents(
    State(state): State<ApiState>,
    Path(workspace_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let documents = Document::list_for_workspace(&workspace_id, &state.db).await?;
    Ok(Json(json!({ "documents": documents })))
}
