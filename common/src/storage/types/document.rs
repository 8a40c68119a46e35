use serde::{Deserialize, Serialize};

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

stored_object!(Document, "document", {
    workspace_id: String,
    source_bytes_ref: String,
    content_type: String,
    status: DocumentStatus,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    total_chunks: usize,
    #[serde(
        serialize_with = "serialize_option_datetime",
        deserialize_with = "deserialize_option_datetime",
        default
    )]
    completed_at: Option<DateTime<Utc>>
});

impl Document {
    pub fn new(workspace_id: String, source_bytes_ref: String, content_type: String) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            workspace_id,
            source_bytes_ref,
            content_type,
            status: DocumentStatus::Pending,
            error_message: None,
            total_chunks: 0,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub async fn create(self, db: &SurrealDbClient) -> Result<Self, AppError> {
        db.store_item(self)
            .await?
            .ok_or_else(|| AppError::InternalError("document failed to persist".into()))
    }

    pub async fn get(id: &str, db: &SurrealDbClient) -> Result<Self, AppError> {
        db.get_item(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("document {id} not found")))
    }

    /// CAS transition `{pending, failed} -> processing` (§4.D, §8 monotonicity). A second trigger
    /// while already `processing` is rejected with `StateConflict`, and a `completed` document can
    /// only be deleted, never re-driven in place.
    pub async fn start_processing(&self, db: &SurrealDbClient) -> Result<Self, AppError> {
        if !matches!(self.status, DocumentStatus::Pending | DocumentStatus::Failed) {
            return Err(AppError::StateConflict(format!(
                "document {} is {:?}, cannot start processing",
                self.id, self.status
            )));
        }

        let updated: Option<Self> = db
            .client
            .query(
                "UPDATE type::thing('document', $id)
                 SET status = 'processing', error_message = NONE
                 WHERE status = $expected
                 RETURN AFTER",
            )
            .bind(("id", self.id.clone()))
            .bind(("expected", self.status.as_str()))
            .await?
            .take(0)?;

        updated.ok_or_else(|| {
            AppError::StateConflict(format!(
                "document {} status changed concurrently, refusing to start processing",
                self.id
            ))
        })
    }

    /// Removes all chunks and vector records for a document being re-driven. Must run before
    /// `start_processing` writes new content so a failed re-drive never leaves orphaned partial
    /// state (§3, §4.D).
    pub async fn wipe_derived_state(id: &str, db: &SurrealDbClient) -> Result<(), AppError> {
        db.client
            .query(
                "DELETE vector_record WHERE document_id = $id;
                 DELETE chunk WHERE document_id = $id;",
            )
            .bind(("id", id.to_string()))
            .await?;
        Ok(())
    }

    pub async fn mark_completed(&self, total_chunks: usize, db: &SurrealDbClient) -> Result<Self, AppError> {
        let updated: Option<Self> = db
            .client
            .query(
                "UPDATE type::thing('document', $id)
                 SET status = 'completed', total_chunks = $total_chunks, completed_at = time::now()
                 WHERE status = 'processing'
                 RETURN AFTER",
            )
            .bind(("id", self.id.clone()))
            .bind(("total_chunks", total_chunks))
            .await?
            .take(0)?;

        updated.ok_or_else(|| {
            AppError::StateConflict(format!(
                "document {} is not processing, cannot complete",
                self.id
            ))
        })
    }

    pub async fn mark_failed(&self, error_message: String, db: &SurrealDbClient) -> Result<Self, AppError> {
        let updated: Option<Self> = db
            .client
            .query(
                "UPDATE type::thing('document', $id)
                 SET status = 'failed', error_message = $error_message
                 WHERE status = 'processing'
                 RETURN AFTER",
            )
            .bind(("id", self.id.clone()))
            .bind(("error_message", error_message))
            .await?
            .take(0)?;

        updated.ok_or_else(|| {
            AppError::StateConflict(format!(
                "document {} is not processing, cannot mark failed",
                self.id
            ))
        })
    }

    pub async fn list_for_workspace(
        workspace_id: &str,
        db: &SurrealDbClient,
    ) -> Result<Vec<Self>, AppError> {
        let docs: Vec<Self> = db
            .client
            .query("SELECT * FROM document WHERE workspace_id = $workspace_id ORDER BY created_at ASC")
            .bind(("workspace_id", workspace_id.to_string()))
            .await?
            .take(0)?;
        Ok(docs)
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
    async fn happy_path_transitions_to_completed() {
        let db = setup_db().await;
        let doc = Document::new("ws1".into(), "uploads/ws1/doc1".into(), "text/plain".into())
            .create(&db)
            .await
            .expect("create");

        let processing = doc.start_processing(&db).await.expect("start processing");
        assert_eq!(processing.status, DocumentStatus::Processing);

        let completed = processing.mark_completed(7, &db).await.expect("complete");
        assert_eq!(completed.status, DocumentStatus::Completed);
        assert_eq!(completed.total_chunks, 7);
        assert!(completed.completed_at.is_some());
    }

    #[tokio::test]
    async fn double_start_processing_is_state_conflict() {
        let db = setup_db().await;
        let doc = Document::new("ws1".into(), "uploads/ws1/doc1".into(), "text/plain".into())
            .create(&db)
            .await
            .expect("create");

        let processing = doc.start_processing(&db).await.expect("start processing");
        let second = processing.start_processing(&db).await;
        assert!(matches!(second, Err(AppError::StateConflict(_))));
    }

    #[tokio::test]
    async fn failed_document_can_be_redriven() {
        let db = setup_db().await;
        let doc = Document::new("ws1".into(), "uploads/ws1/doc1".into(), "text/plain".into())
            .create(&db)
            .await
            .expect("create");

        let processing = doc.start_processing(&db).await.expect("start processing");
        let failed = processing
            .mark_failed("extract empty".into(), &db)
            .await
            .expect("mark failed");
        assert_eq!(failed.status, DocumentStatus::Failed);

        let redriven = failed.start_processing(&db).await.expect("redrive");
        assert_eq!(redriven.status, DocumentStatus::Processing);
    }
}
