use crate::{
    error::AppError,
    storage::db::SurrealDbClient,
    storage::types::{model_result::ModelResult, question_metrics::QuestionMetrics},
    stored_object,
};

stored_object!(EvaluationSummary, "evaluation_summary", {
    evaluation_id: String,
    candidate_provider: String,
    candidate_model: String,
    #[serde(default)]
    mean_accuracy: Option<f32>,
    mean_faithfulness: f32,
    mean_reasoning: f32,
    mean_context_utilization: f32,
    mean_latency_ms: f64,
    mean_cost_usd: f64,
    total_cost_usd: f64,
    overall_score: f32,
    total_questions: usize,
    success_count: usize,
    failed_count: usize
});

impl EvaluationSummary {
    /// Aggregates one candidate's `ModelResult`/`QuestionMetrics` rows into a summary (§3, §4.E).
    /// Means are computed over successful units only; `overall_score` is the mean of each unit's
    /// own renormalized weighted score.
    pub fn aggregate(
        evaluation_id: String,
        candidate_provider: String,
        candidate_model: String,
        results: &[ModelResult],
        metrics_by_result: &std::collections::HashMap<String, QuestionMetrics>,
    ) -> Self {
        let total_questions = results.len();
        let successes: Vec<&ModelResult> = results.iter().filter(|r| r.is_success()).collect();
        let success_count = successes.len();
        let failed_count = total_questions - success_count;

        let mean_latency_ms = mean(successes.iter().filter_map(|r| r.latency_ms).map(|v| v as f64));
        let mean_cost_usd = mean(successes.iter().filter_map(|r| r.cost_usd));
        let total_cost_usd = successes.iter().filter_map(|r| r.cost_usd).sum();

        let metrics: Vec<&QuestionMetrics> = successes
            .iter()
            .filter_map(|r| metrics_by_result.get(&r.id))
            .collect();

        let mean_accuracy = mean_option(metrics.iter().filter_map(|m| m.accuracy));
        let mean_faithfulness = mean(metrics.iter().filter_map(|m| m.faithfulness)) as f32;
        let mean_reasoning = mean(metrics.iter().filter_map(|m| m.reasoning)) as f32;
        let mean_context_utilization = mean(metrics.iter().filter_map(|m| m.context_utilization)) as f32;

        let overall_score = mean(metrics.iter().filter_map(|m| m.overall_score())) as f32;

        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            evaluation_id,
            candidate_provider,
            candidate_model,
            mean_accuracy,
            mean_faithfulness,
            mean_reasoning,
            mean_context_utilization,
            mean_latency_ms,
            mean_cost_usd: round6(mean_cost_usd),
            total_cost_usd: round6(total_cost_usd),
            overall_score,
            total_questions,
            success_count,
            failed_count,
            created_at: now,
            updated_at: now,
        }
    }

    pub async fn create(self, db: &SurrealDbClient) -> Result<Self, AppError> {
        db.store_item(self)
            .await?
            .ok_or_else(|| AppError::InternalError("evaluation summary failed to persist".into()))
    }

    /// Candidate ranking (highest `overall_score` first; ties broken by lower mean latency, then
    /// lower mean cost) — spec leaves the ranking order an implementation choice within the
    /// overall_score definition, resolved here for deterministic output.
    pub async fn list_ranked(
        evaluation_id: &str,
        db: &SurrealDbClient,
    ) -> Result<Vec<Self>, AppError> {
        let mut summaries: Vec<Self> = db
            .client
            .query("SELECT * FROM evaluation_summary WHERE evaluation_id = $evaluation_id")
            .bind(("evaluation_id", evaluation_id.to_string()))
            .await?
            .take(0)?;

        summaries.sort_by(|a, b| {
            b.overall_score
                .partial_cmp(&a.overall_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.mean_latency_ms.partial_cmp(&b.mean_latency_ms).unwrap_or(std::cmp::Ordering::Equal))
                .then(a.mean_cost_usd.partial_cmp(&b.mean_cost_usd).unwrap_or(std::cmp::Ordering::Equal))
        });

        Ok(summaries)
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let values: Vec<f64> = values.collect();
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn mean_option(values: impl Iterator<Item = f32>) -> Option<f32> {
    let values: Vec<f32> = values.collect();
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f32>() / values.len() as f32)
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn aggregate_counts_successes_and_failures() {
        let results = vec![
            ModelResult::success(
                "ev1".into(), "q1".into(), 0, "openai".into(), "gpt".into(),
                "answer".into(), "ctx".into(), 100, 0.001, 10, 5,
            ),
            ModelResult::failure(
                "ev1".into(), "q2".into(), 1, "openai".into(), "gpt".into(), "timeout".into(),
            ),
        ];
        let metrics_by_result = HashMap::new();

        let summary = EvaluationSummary::aggregate(
            "ev1".into(), "openai".into(), "gpt".into(), &results, &metrics_by_result,
        );

        assert_eq!(summary.total_questions, 2);
        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.failed_count, 1);
    }

    #[test]
    fn aggregate_uses_only_successful_units_for_means() {
        let success = ModelResult::success(
            "ev1".into(), "q1".into(), 0, "openai".into(), "gpt".into(),
            "answer".into(), "ctx".into(), 200, 0.002, 10, 5,
        );
        let metrics = QuestionMetrics::new(
            success.id.clone(),
            Some(super::super::question_metrics::JudgeScore::new(1.0, "ok".into())),
            Some(super::super::question_metrics::JudgeScore::new(1.0, "ok".into())),
            Some(super::super::question_metrics::JudgeScore::new(1.0, "ok".into())),
            Some(super::super::question_metrics::JudgeScore::new(1.0, "ok".into())),
        );
        let mut metrics_by_result = HashMap::new();
        metrics_by_result.insert(success.id.clone(), metrics);

        let results = vec![success];
        let summary = EvaluationSummary::aggregate(
            "ev1".into(), "openai".into(), "gpt".into(), &results, &metrics_by_result,
        );

        assert!((summary.overall_score - 1.0).abs() < 1e-6);
        assert_eq!(summary.mean_latency_ms, 200.0);
    }
}
