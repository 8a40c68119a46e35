use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

stored_object!(ModelResult, "model_result", {
    evaluation_id: String,
    question_id: String,
    question_index: usize,
    candidate_provider: String,
    candidate_model: String,
    #[serde(default)]
    generated_answer: Option<String>,
    #[serde(default)]
    retrieved_context: Option<String>,
    #[serde(default)]
    latency_ms: Option<u64>,
    #[serde(default)]
    cost_usd: Option<f64>,
    #[serde(default)]
    prompt_tokens: Option<u32>,
    #[serde(default)]
    completion_tokens: Option<u32>,
    #[serde(default)]
    error: Option<String>
});

impl ModelResult {
    #[allow(clippy::too_many_arguments)]
    pub fn success(
        evaluation_id: String,
        question_id: String,
        question_index: usize,
        candidate_provider: String,
        candidate_model: String,
        generated_answer: String,
        retrieved_context: String,
        latency_ms: u64,
        cost_usd: f64,
        prompt_tokens: u32,
        completion_tokens: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            evaluation_id,
            question_id,
            question_index,
            candidate_provider,
            candidate_model,
            generated_answer: Some(generated_answer),
            retrieved_context: Some(retrieved_context),
            latency_ms: Some(latency_ms),
            cost_usd: Some(round_to_six_decimals(cost_usd)),
            prompt_tokens: Some(prompt_tokens),
            completion_tokens: Some(completion_tokens),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A unit failure still produces a row (§4.E failure policy) so the evaluation can report a
    /// `failed_count` without losing the question/candidate pairing.
    pub fn failure(
        evaluation_id: String,
        question_id: String,
        question_index: usize,
        candidate_provider: String,
        candidate_model: String,
        error: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            evaluation_id,
            question_id,
            question_index,
            candidate_provider,
            candidate_model,
            generated_answer: None,
            retrieved_context: None,
            latency_ms: None,
            cost_usd: None,
            prompt_tokens: None,
            completion_tokens: None,
            error: Some(error),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub async fn create(self, db: &SurrealDbClient) -> Result<Self, AppError> {
        db.store_item(self)
            .await?
            .ok_or_else(|| AppError::InternalError("model result failed to persist".into()))
    }

    /// Deterministic retrieval order (§4.E): by `question_index` ascending, then candidate
    /// *declaration* order — the position each candidate holds in the owning `Evaluation`'s
    /// `candidate_models`, not alphabetical order, since two evaluations can declare the same
    /// candidates in different orders and callers expect their own order back.
    pub async fn list_for_evaluation(
        evaluation_id: &str,
        db: &SurrealDbClient,
    ) -> Result<Vec<Self>, AppError> {
        let evaluation = crate::storage::types::evaluation::Evaluation::get(evaluation_id, db).await?;
        let declaration_order: std::collections::HashMap<(String, String), usize> = evaluation
            .candidate_models
            .iter()
            .enumerate()
            .map(|(index, candidate)| ((candidate.provider.clone(), candidate.model.clone()), index))
            .collect();

        let mut results: Vec<Self> = db
            .client
            .query(
                "SELECT * FROM model_result
                 WHERE evaluation_id = $evaluation_id
                 ORDER BY question_index ASC",
            )
            .bind(("evaluation_id", evaluation_id.to_string()))
            .await?
            .take(0)?;

        results.sort_by_key(|result| {
            let candidate_rank = declaration_order
                .get(&(result.candidate_provider.clone(), result.candidate_model.clone()))
                .copied()
                .unwrap_or(usize::MAX);
            (result.question_index, candidate_rank)
        });

        Ok(results)
    }

    pub async fn list_for_candidate(
        evaluation_id: &str,
        candidate_provider: &str,
        candidate_model: &str,
        db: &SurrealDbClient,
    ) -> Result<Vec<Self>, AppError> {
        let results: Vec<Self> = db
            .client
            .query(
                "SELECT * FROM model_result
                 WHERE evaluation_id = $evaluation_id
                   AND candidate_provider = $candidate_provider
                   AND candidate_model = $candidate_model
                 ORDER BY question_index ASC",
            )
            .bind(("evaluation_id", evaluation_id.to_string()))
            .bind(("candidate_provider", candidate_provider.to_string()))
            .bind(("candidate_model", candidate_model.to_string()))
            .await?
            .take(0)?;
        Ok(results)
    }
}

pub fn round_to_six_decimals(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn results_are_ordered_by_question_then_candidate_declaration_order() {
        use crate::storage::types::evaluation::{CandidateModel, Evaluation, EvaluationSettings};

        let db = SurrealDbClient::memory("test_ns", &uuid::Uuid::new_v4().to_string())
            .await
            .expect("db");
        db.apply_migrations().await.expect("migrations");

        // Declares "openai" before "anthropic" — the reverse of alphabetical order, so a test
        // that still passes under a plain ORDER BY candidate_provider ASC would be a false
        // positive for the declaration-order guarantee this is meant to cover.
        let evaluation = Evaluation::new(
            "dataset-1".into(),
            vec![
                CandidateModel { provider: "openai".into(), model: "gpt".into() },
                CandidateModel { provider: "anthropic".into(), model: "claude".into() },
            ],
            "judge".into(),
            EvaluationSettings {
                top_k: 5,
                temperature: 0.0,
                max_tokens: 256,
                similarity_threshold: None,
                worker_pool_size: 4,
            },
        )
        .create(&db)
        .await
        .expect("evaluation");

        ModelResult::success(
            evaluation.id.clone(), "q2".into(), 1, "anthropic".into(), "claude".into(),
            "a".into(), "ctx".into(), 100, 0.000123, 10, 10,
        )
        .create(&db).await.expect("create");
        ModelResult::success(
            evaluation.id.clone(), "q1-anthropic".into(), 0, "anthropic".into(), "claude".into(),
            "a".into(), "ctx".into(), 100, 0.000123, 10, 10,
        )
        .create(&db).await.expect("create");
        ModelResult::success(
            evaluation.id.clone(), "q1-openai".into(), 0, "openai".into(), "gpt".into(),
            "a".into(), "ctx".into(), 100, 0.000123, 10, 10,
        )
        .create(&db).await.expect("create");

        let results = ModelResult::list_for_evaluation(&evaluation.id, &db).await.expect("list");
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].question_index, 0);
        assert_eq!(results[0].candidate_provider, "openai");
        assert_eq!(results[1].question_index, 0);
        assert_eq!(results[1].candidate_provider, "anthropic");
        assert_eq!(results[2].question_index, 1);
    }

    #[test]
    fn cost_rounds_to_six_decimals() {
        assert_eq!(round_to_six_decimals(0.0001234567), 0.000123);
    }
}
