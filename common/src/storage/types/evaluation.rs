use serde::{Deserialize, Serialize};

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl EvaluationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CandidateModel {
    pub provider: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationSettings {
    pub top_k: usize,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(default)]
    pub similarity_threshold: Option<f32>,
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,
}

fn default_worker_pool_size() -> usize {
    8
}

stored_object!(Evaluation, "evaluation", {
    dataset_id: String,
    candidate_models: Vec<CandidateModel>,
    judge_model: String,
    settings: EvaluationSettings,
    status: EvaluationStatus,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(
        serialize_with = "serialize_option_datetime",
        deserialize_with = "deserialize_option_datetime",
        default
    )]
    completed_at: Option<DateTime<Utc>>
});

impl Evaluation {
    pub fn new(
        dataset_id: String,
        candidate_models: Vec<CandidateModel>,
        judge_model: String,
        settings: EvaluationSettings,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            dataset_id,
            candidate_models,
            judge_model,
            settings,
            status: EvaluationStatus::Pending,
            error_message: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub async fn create(self, db: &SurrealDbClient) -> Result<Self, AppError> {
        db.store_item(self)
            .await?
            .ok_or_else(|| AppError::InternalError("evaluation failed to persist".into()))
    }

    pub async fn get(id: &str, db: &SurrealDbClient) -> Result<Self, AppError> {
        db.get_item(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("evaluation {id} not found")))
    }

    /// CAS transition `pending -> running`, triggered when the executor picks the job up.
    pub async fn start_running(&self, db: &SurrealDbClient) -> Result<Self, AppError> {
        let updated: Option<Self> = db
            .client
            .query(
                "UPDATE type::thing('evaluation', $id)
                 SET status = 'running'
                 WHERE status = 'pending'
                 RETURN AFTER",
            )
            .bind(("id", self.id.clone()))
            .await?
            .take(0)?;

        updated.ok_or_else(|| {
            AppError::StateConflict(format!(
                "evaluation {} is not pending, cannot start running",
                self.id
            ))
        })
    }

    pub async fn mark_completed(&self, db: &SurrealDbClient) -> Result<Self, AppError> {
        let updated: Option<Self> = db
            .client
            .query(
                "UPDATE type::thing('evaluation', $id)
                 SET status = 'completed', completed_at = time::now()
                 WHERE status = 'running'
                 RETURN AFTER",
            )
            .bind(("id", self.id.clone()))
            .await?
            .take(0)?;

        updated.ok_or_else(|| {
            AppError::StateConflict(format!(
                "evaluation {} is not running, cannot complete",
                self.id
            ))
        })
    }

    /// Failure of the overall run is reserved for unrecoverable setup conditions (unreadable
    /// dataset, unknown candidate model, judge auth failure on first use) — per-unit failures do
    /// not fail the run (§4.E).
    pub async fn mark_failed(&self, error_message: String, db: &SurrealDbClient) -> Result<Self, AppError> {
        let updated: Option<Self> = db
            .client
            .query(
                "UPDATE type::thing('evaluation', $id)
                 SET status = 'failed', error_message = $error_message, completed_at = time::now()
                 WHERE status IN ['pending', 'running']
                 RETURN AFTER",
            )
            .bind(("id", self.id.clone()))
            .bind(("error_message", error_message))
            .await?
            .take(0)?;

        updated.ok_or_else(|| {
            AppError::StateConflict(format!(
                "evaluation {} already reached a terminal state",
                self.id
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> EvaluationSettings {
        EvaluationSettings {
            top_k: 5,
            temperature: 0.0,
            max_tokens: 512,
            similarity_threshold: None,
            worker_pool_size: 8,
        }
    }

    #[tokio::test]
    async fn lifecycle_pending_running_completed() {
        let db = SurrealDbClient::memory("test_ns", &uuid::Uuid::new_v4().to_string())
            .await
            .expect("db");
        db.apply_migrations().await.expect("migrations");

        let candidates = vec![CandidateModel {
            provider: "openai".into(),
            model: "gpt-4o-mini".into(),
        }];
        let evaluation = Evaluation::new("ds1".into(), candidates, "gpt-4o".into(), settings())
            .create(&db)
            .await
            .expect("create");

        let running = evaluation.start_running(&db).await.expect("start running");
        assert_eq!(running.status, EvaluationStatus::Running);

        let completed = running.mark_completed(&db).await.expect("complete");
        assert_eq!(completed.status, EvaluationStatus::Completed);
        assert!(completed.completed_at.is_some());
    }

    #[tokio::test]
    async fn failing_a_pending_evaluation_is_allowed() {
        let db = SurrealDbClient::memory("test_ns", &uuid::Uuid::new_v4().to_string())
            .await
            .expect("db");
        db.apply_migrations().await.expect("migrations");

        let evaluation = Evaluation::new(
            "ds1".into(),
            vec![CandidateModel { provider: "openai".into(), model: "gpt-4o-mini".into() }],
            "gpt-4o".into(),
            settings(),
        )
        .create(&db)
        .await
        .expect("create");

        let failed = evaluation
            .mark_failed("dataset unreadable".into(), &db)
            .await
            .expect("fail");
        assert_eq!(failed.status, EvaluationStatus::Failed);
    }
}
