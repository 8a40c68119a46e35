use axum::{extract::State, response::IntoResponse, Json};
use common::{storage::types::workspace::Workspace, utils::embedding::EmbeddingProvider};
use retrieval_pipeline::{retrieve, RetrievalConfig, RetrievedChunk};
use serde::Deserialize;
use serde_json::json;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct RagQueryRequest {
    pub workspace_id: String,
    pub query: String,
    pub top_k: Option<usize>,
}

/// Route: POST /rag/query (§6). Ad-hoc retrieval against a workspace's vector index, independent
/// of any evaluation run.
pub async fn rag_query(
    State(state): State<ApiState>,
    Json(input): Json<RagQueryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let workspace = Workspace::get(&input.workspace_id, &state.db).await?;

    let embedding_provider = EmbeddingProvider::from_config(
        &state.config,
        &workspace.embedding_provider,
        &workspace.embedding_model,
        workspace.embedding_dimension,
        Some((*state.openai_client).clone()),
    )?;

    let config = RetrievalConfig {
        top_k: input.top_k.map(|k| k.clamp(1, 100)).unwrap_or_else(|| RetrievalConfig::default().top_k),
        similarity_threshold: None,
    };

    let chunks: Vec<RetrievedChunk> =
        retrieve(&state.db, &embedding_provider, &workspace, &input.query, config).await?;

    Ok(Json(json!({
        "results": chunks
            .into_iter()
            .map(|chunk| json!({
                "chunk_id": chunk.chunk_id,
                "document_id": chunk.document_id,
                "chunk_index": chunk.chunk_index,
                "score": chunk.score,
                "text": chunk.text,
            }))
            .collect::<Vec<_>>()
    })))
}
