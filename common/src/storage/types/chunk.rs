use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

stored_object!(Chunk, "chunk", {
    document_id: String,
    workspace_id: String,
    chunk_index: usize,
    text: String,
    token_count: usize
});

impl Chunk {
    pub fn new(
        document_id: String,
        workspace_id: String,
        chunk_index: usize,
        text: String,
        token_count: usize,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            document_id,
            workspace_id,
            chunk_index,
            text,
            token_count,
            created_at: now,
            updated_at: now,
        }
    }

    /// Atomic batch insert: every chunk in `chunks` becomes visible or none does (§4.D persist stage).
    pub async fn create_batch(chunks: Vec<Self>, db: &SurrealDbClient) -> Result<(), AppError> {
        if chunks.is_empty() {
            return Ok(());
        }
        db.client
            .query("BEGIN TRANSACTION; INSERT INTO chunk $chunks; COMMIT TRANSACTION;")
            .bind(("chunks", chunks))
            .await?;
        Ok(())
    }

    pub async fn list_for_document(
        document_id: &str,
        db: &SurrealDbClient,
    ) -> Result<Vec<Self>, AppError> {
        let chunks: Vec<Self> = db
            .client
            .query("SELECT * FROM chunk WHERE document_id = $document_id ORDER BY chunk_index ASC")
            .bind(("document_id", document_id.to_string()))
            .await?
            .take(0)?;
        Ok(chunks)
    }
}
