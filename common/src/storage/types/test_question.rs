use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

stored_object!(TestQuestion, "test_question", {
    dataset_id: String,
    question_index: usize,
    question_text: String,
    #[serde(default)]
    expected_answer: Option<String>,
    #[serde(default)]
    context_reference: Option<String>
});

impl TestQuestion {
    pub fn new(
        dataset_id: String,
        question_index: usize,
        question_text: String,
        expected_answer: Option<String>,
        context_reference: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            dataset_id,
            question_index,
            question_text,
            expected_answer,
            context_reference,
            created_at: now,
            updated_at: now,
        }
    }

    pub async fn create(self, db: &SurrealDbClient) -> Result<Self, AppError> {
        db.store_item(self)
            .await?
            .ok_or_else(|| AppError::InternalError("test question failed to persist".into()))
    }

    /// Ordered by `question_index` ascending (§4.E ordering contract).
    pub async fn list_for_dataset(
        dataset_id: &str,
        db: &SurrealDbClient,
    ) -> Result<Vec<Self>, AppError> {
        let questions: Vec<Self> = db
            .client
            .query("SELECT * FROM test_question WHERE dataset_id = $dataset_id ORDER BY question_index ASC")
            .bind(("dataset_id", dataset_id.to_string()))
            .await?
            .take(0)?;
        Ok(questions)
    }

    /// Next contiguous index to assign when appending a question to a dataset.
    pub async fn next_index(dataset_id: &str, db: &SurrealDbClient) -> Result<usize, AppError> {
        let existing = Self::list_for_dataset(dataset_id, db).await?;
        Ok(existing.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn questions_list_in_index_order() {
        let db = SurrealDbClient::memory("test_ns", &uuid::Uuid::new_v4().to_string())
            .await
            .expect("db");
        db.apply_migrations().await.expect("migrations");

        for idx in (0..3).rev() {
            TestQuestion::new("ds1".into(), idx, format!("question {idx}"), None, None)
                .create(&db)
                .await
                .expect("create");
        }

        let questions = TestQuestion::list_for_dataset("ds1", &db).await.expect("list");
        let indexes: Vec<usize> = questions.iter().map(|q| q.question_index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn next_index_is_contiguous() {
        let db = SurrealDbClient::memory("test_ns", &uuid::Uuid::new_v4().to_string())
            .await
            .expect("db");
        db.apply_migrations().await.expect("migrations");

        assert_eq!(TestQuestion::next_index("ds1", &db).await.unwrap(), 0);
        TestQuestion::new("ds1".into(), 0, "q0".into(), None, None)
            .create(&db)
            .await
            .unwrap();
        assert_eq!(TestQuestion::next_index("ds1", &db).await.unwrap(), 1);
    }
}
