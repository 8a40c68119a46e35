use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

stored_object!(TestDataset, "test_dataset", {
    workspace_id: String,
    name: String
});

impl TestDataset {
    pub fn new(workspace_id: String, name: String) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            workspace_id,
            name,
            created_at: now,
            updated_at: now,
        }
    }

    pub async fn create(self, db: &SurrealDbClient) -> Result<Self, AppError> {
        db.store_item(self)
            .await?
            .ok_or_else(|| AppError::InternalError("test dataset failed to persist".into()))
    }

    pub async fn get(id: &str, db: &SurrealDbClient) -> Result<Self, AppError> {
        db.get_item(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("test dataset {id} not found")))
    }

    pub async fn list_for_workspace(
        workspace_id: &str,
        db: &SurrealDbClient,
    ) -> Result<Vec<Self>, AppError> {
        let datasets: Vec<Self> = db
            .client
            .query("SELECT * FROM test_dataset WHERE workspace_id = $workspace_id ORDER BY created_at ASC")
            .bind(("workspace_id", workspace_id.to_string()))
            .await?
            .take(0)?;
        Ok(datasets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_and_get_roundtrip() {
        let db = SurrealDbClient::memory("test_ns", &uuid::Uuid::new_v4().to_string())
            .await
            .expect("db");
        db.apply_migrations().await.expect("migrations");

        let dataset = TestDataset::new("ws1".into(), "smoke test".into())
            .create(&db)
            .await
            .expect("create");

        let fetched = TestDataset::get(&dataset.id, &db).await.expect("get");
        assert_eq!(fetched.name, "smoke test");
    }
}
