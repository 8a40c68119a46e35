use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

stored_object!(Workspace, "workspace", {
    name: String,
    embedding_provider: String,
    embedding_model: String,
    embedding_dimension: usize,
    chunk_size_tokens: usize,
    chunk_overlap_tokens: usize,
    /// Flips to `true` the moment the first document in this workspace reaches `completed`.
    /// Guards the "immutable after first document is embedded" invariant (§3).
    #[serde(default)]
    vectors_locked: bool
});

impl Workspace {
    pub fn new(
        name: String,
        embedding_provider: String,
        embedding_model: String,
        embedding_dimension: usize,
        chunk_size_tokens: usize,
        chunk_overlap_tokens: usize,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            embedding_provider,
            embedding_model,
            embedding_dimension,
            chunk_size_tokens,
            chunk_overlap_tokens,
            vectors_locked: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub async fn create(self, db: &SurrealDbClient) -> Result<Self, AppError> {
        db.store_item(self)
            .await?
            .ok_or_else(|| AppError::InternalError("workspace failed to persist".into()))
    }

    pub async fn get(id: &str, db: &SurrealDbClient) -> Result<Self, AppError> {
        db.get_item(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("workspace {id} not found")))
    }

    /// Marks the workspace's embedding configuration as locked. Idempotent: locking an
    /// already-locked workspace is a no-op, not a conflict.
    pub async fn lock_vectors(&self, db: &SurrealDbClient) -> Result<(), AppError> {
        if self.vectors_locked {
            return Ok(());
        }
        let _: Option<Self> = db
            .client
            .query("UPDATE type::thing('workspace', $id) SET vectors_locked = true")
            .bind(("id", self.id.clone()))
            .await?
            .take(0)?;
        Ok(())
    }

    /// Cascades deletion to Documents, Chunks, and VectorRecords owned by this workspace (§3).
    pub async fn delete_cascade(id: &str, db: &SurrealDbClient) -> Result<(), AppError> {
        db.client
            .query(
                "DELETE vector_record WHERE workspace_id = $id;
                 DELETE chunk WHERE document_id IN (SELECT VALUE id FROM document WHERE workspace_id = $id);
                 DELETE document WHERE workspace_id = $id;
                 DELETE type::thing('workspace', $id);",
            )
            .bind(("id", id.to_string()))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_db() -> SurrealDbClient {
        let db = SurrealDbClient::memory("test_ns", &uuid::Uuid::new_v4().to_string())
            .await
            .expect("db");
        db.apply_migrations().await.expect("migrations");
        db
    }

    #[tokio::test]
    async fn create_and_get_roundtrip() {
        let db = setup_db().await;
        let ws = Workspace::new("corpus".into(), "openai".into(), "text-embedding-3-small".into(), 1536, 500, 100)
            .create(&db)
            .await
            .expect("create");

        let fetched = Workspace::get(&ws.id, &db).await.expect("get");
        assert_eq!(fetched.id, ws.id);
        assert!(!fetched.vectors_locked);
    }

    #[tokio::test]
    async fn lock_vectors_is_idempotent() {
        let db = setup_db().await;
        let ws = Workspace::new("corpus".into(), "openai".into(), "m".into(), 3, 500, 100)
            .create(&db)
            .await
            .expect("create");

        ws.lock_vectors(&db).await.expect("lock once");
        ws.lock_vectors(&db).await.expect("lock twice");

        let fetched = Workspace::get(&ws.id, &db).await.expect("get");
        assert!(fetched.vectors_locked);
    }
}
