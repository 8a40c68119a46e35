use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum IngestionTaskStatus {
    Created,
    InProgress { attempts: u32, last_attempt: DateTime<Utc> },
    Completed,
    Error(String),
}

stored_object!(IngestionTask, "ingestion_task", {
    document_id: String,
    status: IngestionTaskStatus
});

pub const MAX_ATTEMPTS: u32 = 3;

impl IngestionTask {
    pub fn new(document_id: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            document_id,
            status: IngestionTaskStatus::Created,
            created_at: now,
            updated_at: now,
        }
    }

    pub async fn create(self, db: &SurrealDbClient) -> Result<Self, AppError> {
        db.store_item(self)
            .await?
            .ok_or_else(|| AppError::InternalError("ingestion task failed to persist".into()))
    }

    /// Claims the oldest ready task (`Created`, or `InProgress` with attempts remaining) via a
    /// per-candidate CAS update, so two workers racing the same pop never both win the same task
    /// (§4.D "triggered by a background submission", §5 concurrency).
    pub async fn claim_next_ready(db: &SurrealDbClient) -> Result<Option<Self>, AppError> {
        let candidates: Vec<Self> = db
            .client
            .query(
                "SELECT * FROM ingestion_task
                 WHERE status = 'Created'
                    OR (status.InProgress != NONE AND status.InProgress.attempts < $max_attempts)
                 ORDER BY created_at ASC",
            )
            .bind(("max_attempts", MAX_ATTEMPTS))
            .await?
            .take(0)?;

        for candidate in candidates {
            let attempts = match &candidate.status {
                IngestionTaskStatus::Created => 0,
                IngestionTaskStatus::InProgress { attempts, .. } => *attempts,
                _ => continue,
            };

            let claimed = candidate.try_claim(attempts, db).await?;
            if let Some(claimed) = claimed {
                return Ok(Some(claimed));
            }
        }

        Ok(None)
    }

    async fn try_claim(&self, prior_attempts: u32, db: &SurrealDbClient) -> Result<Option<Self>, AppError> {
        let new_status = IngestionTaskStatus::InProgress {
            attempts: prior_attempts + 1,
            last_attempt: Utc::now(),
        };

        let updated: Option<Self> = db
            .client
            .query(
                "UPDATE type::thing('ingestion_task', $id)
                 SET status = $status
                 WHERE status = $expected
                 RETURN AFTER",
            )
            .bind(("id", self.id.clone()))
            .bind(("status", new_status))
            .bind(("expected", self.status.clone()))
            .await?
            .take(0)?;

        Ok(updated)
    }

    pub async fn mark_succeeded(&self, db: &SurrealDbClient) -> Result<Self, AppError> {
        let updated: Option<Self> = db
            .client
            .query("UPDATE type::thing('ingestion_task', $id) SET status = 'Completed' RETURN AFTER")
            .bind(("id", self.id.clone()))
            .await?
            .take(0)?;

        updated.ok_or_else(|| AppError::NotFound(format!("ingestion task {} not found", self.id)))
    }

    /// Records a stage failure. Dead-letters (records a terminal `Error`) once attempts are
    /// exhausted; otherwise leaves the task claimable again for the next worker poll.
    pub async fn mark_failed(&self, error: String, db: &SurrealDbClient) -> Result<Self, AppError> {
        let attempts = match &self.status {
            IngestionTaskStatus::InProgress { attempts, .. } => *attempts,
            _ => 0,
        };

        let status = if attempts >= MAX_ATTEMPTS {
            IngestionTaskStatus::Error(error)
        } else {
            self.status.clone()
        };

        let updated: Option<Self> = db
            .client
            .query("UPDATE type::thing('ingestion_task', $id) SET status = $status RETURN AFTER")
            .bind(("id", self.id.clone()))
            .bind(("status", status))
            .await?
            .take(0)?;

        updated.ok_or_else(|| AppError::NotFound(format!("ingestion task {} not found", self.id)))
    }

    pub fn can_retry(&self) -> bool {
        match &self.status {
            IngestionTaskStatus::Created => true,
            IngestionTaskStatus::InProgress { attempts, .. } => *attempts < MAX_ATTEMPTS,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_db() -> SurrealDbClient {
        let db = SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("db");
        db.apply_migrations().await.expect("migrations");
        db
    }

    #[tokio::test]
    async fn claim_next_ready_claims_oldest_task_once() {
        let db = setup_db().await;
        IngestionTask::new("doc1".into()).create(&db).await.expect("create");

        let claimed = IngestionTask::claim_next_ready(&db).await.expect("claim").expect("some");
        assert!(matches!(claimed.status, IngestionTaskStatus::InProgress { attempts: 1, .. }));

        let second_claim = IngestionTask::claim_next_ready(&db).await.expect("claim");
        assert!(second_claim.is_none(), "already-claimed task must not be claimable again");
    }

    #[tokio::test]
    async fn mark_failed_dead_letters_after_max_attempts() {
        let db = setup_db().await;
        let mut task = IngestionTask::new("doc1".into()).create(&db).await.expect("create");

        for _ in 0..MAX_ATTEMPTS {
            let claimed = IngestionTask::claim_next_ready(&db).await.expect("claim").expect("some");
            task = claimed.mark_failed("boom".into(), &db).await.expect("mark failed");
        }

        assert!(matches!(task.status, IngestionTaskStatus::Error(_)));
        assert!(!task.can_retry());
    }

    #[tokio::test]
    async fn mark_succeeded_sets_completed() {
        let db = setup_db().await;
        let task = IngestionTask::new("doc1".into()).create(&db).await.expect("create");
        let claimed = IngestionTask::claim_next_ready(&db).await.expect("claim").expect("some");

        let completed = claimed.mark_succeeded(&db).await.expect("succeed");
        assert_eq!(completed.status, IngestionTaskStatus::Completed);

        let _ = task;
    }
}
