use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{vector_record::VectorRecord, workspace::Workspace},
    },
    utils::embedding::EmbeddingProvider,
};
use tracing::instrument;

/// Retrieval knobs threaded through from `Evaluation.settings` or `/rag/query` (§4.C, §4.E).
#[derive(Debug, Clone, Copy)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub similarity_threshold: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            similarity_threshold: None,
        }
    }
}

/// A chunk surfaced by retrieval, ready to be concatenated into `retrieved_context` or rendered
/// in a `/rag/query` response (§4.E, §6).
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub document_id: String,
    pub chunk_index: usize,
    pub score: f32,
    pub text: String,
}

/// Embeds `query_text` with the workspace's own embedding provider and runs a deterministic
/// top-k cosine query against its vector index (§4.C). Callers own ordering: results already come
/// back sorted by descending score, ties broken by ascending `(document_id, chunk_index)`.
#[instrument(skip_all, fields(workspace_id = %workspace.id, top_k = config.top_k))]
pub async fn retrieve(
    db: &SurrealDbClient,
    embedding_provider: &EmbeddingProvider,
    workspace: &Workspace,
    query_text: &str,
    config: RetrievalConfig,
) -> Result<Vec<RetrievedChunk>, AppError> {
    let query_embedding = embedding_provider.embed(query_text).await?;

    let scored = VectorRecord::query_top_k(
        &workspace.id,
        &query_embedding,
        config.top_k,
        config.similarity_threshold,
        db,
    )
    .await?;

    Ok(scored
        .into_iter()
        .map(|scored| RetrievedChunk {
            chunk_id: scored.record.id,
            document_id: scored.record.document_id,
            chunk_index: scored.record.chunk_index,
            score: scored.score,
            text: scored.record.text_excerpt,
        })
        .collect())
}

/// Joins retrieved chunks into the flat context string a generation prompt is built from,
/// preserving the retrieval order (§4.E "deterministically ordered by descending score").
pub fn join_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::storage::types::{chunk::Chunk, document::Document};
    use uuid::Uuid;

    async fn setup_db() -> SurrealDbClient {
        let db = SurrealDbClient::memory("retrieval_test", &Uuid::new_v4().to_string())
            .await
            .expect("db");
        db.apply_migrations().await.expect("migrations");
        db
    }

    fn local_bge() -> EmbeddingProvider {
        EmbeddingProvider::local_bge().expect("local embedding model")
    }

    #[tokio::test]
    async fn retrieve_orders_by_score_descending() {
        let db = setup_db().await;
        let provider = local_bge();
        let workspace = Workspace::new("corpus".into(), "local-bge".into(), "bge-small".into(), 384, 500, 100)
            .create(&db)
            .await
            .expect("workspace");
        let document = Document::new(workspace.id.clone(), "uploads/doc1".into(), "text/plain".into())
            .create(&db)
            .await
            .expect("document");

        let close = Chunk::new(document.id.clone(), workspace.id.clone(), 0, "Tokio uses cooperative scheduling for async tasks.".into(), 9);
        let far = Chunk::new(document.id.clone(), workspace.id.clone(), 1, "Bananas are a good source of potassium.".into(), 8);

        let close_embedding = provider.embed(&close.text).await.expect("embed close");
        let far_embedding = provider.embed(&far.text).await.expect("embed far");

        let records = vec![
            VectorRecord::new(close.id.clone(), workspace.id.clone(), document.id.clone(), close.chunk_index, close_embedding, close.text.clone()),
            VectorRecord::new(far.id.clone(), workspace.id.clone(), document.id.clone(), far.chunk_index, far_embedding, far.text.clone()),
        ];
        VectorRecord::upsert_batch(records, workspace.embedding_dimension, &db)
            .await
            .expect("upsert");

        let config = RetrievalConfig {
            top_k: 2,
            similarity_threshold: None,
        };
        let results = retrieve(&db, &provider, &workspace, "async task scheduling in Tokio", config)
            .await
            .expect("retrieve");

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_id, close.id);
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn retrieve_is_deterministic_across_repeated_calls() {
        let db = setup_db().await;
        let provider = local_bge();
        let workspace = Workspace::new("corpus".into(), "local-bge".into(), "bge-small".into(), 384, 500, 100)
            .create(&db)
            .await
            .expect("workspace");
        let document = Document::new(workspace.id.clone(), "uploads/doc1".into(), "text/plain".into())
            .create(&db)
            .await
            .expect("document");

        for i in 0..3 {
            let chunk = Chunk::new(document.id.clone(), workspace.id.clone(), i, format!("chunk body number {i}"), 4);
            let embedding = provider.embed(&chunk.text).await.expect("embed");
            let record = VectorRecord::new(chunk.id.clone(), workspace.id.clone(), document.id.clone(), chunk.chunk_index, embedding, chunk.text.clone());
            VectorRecord::upsert_batch(vec![record], workspace.embedding_dimension, &db)
                .await
                .expect("upsert");
        }

        let config = RetrievalConfig {
            top_k: 5,
            similarity_threshold: None,
        };
        let first = retrieve(&db, &provider, &workspace, "chunk body", config).await.expect("first retrieve");
        let second = retrieve(&db, &provider, &workspace, "chunk body", config).await.expect("second retrieve");

        let first_ids: Vec<&str> = first.iter().map(|c| c.chunk_id.as_str()).collect();
        let second_ids: Vec<&str> = second.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(first_ids, second_ids);
    }
}
