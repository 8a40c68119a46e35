use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

#[derive(Debug, Clone, PartialEq)]
pub struct JudgeScore {
    pub score: f32,
    pub explanation: String,
}

impl JudgeScore {
    /// Clamps the parsed score into `[0, 1]` (§4.E numeric semantics).
    pub fn new(score: f32, explanation: String) -> Self {
        Self {
            score: score.clamp(0.0, 1.0),
            explanation,
        }
    }
}

stored_object!(QuestionMetrics, "question_metrics", {
    model_result_id: String,
    #[serde(default)]
    accuracy: Option<f32>,
    #[serde(default)]
    accuracy_explanation: Option<String>,
    #[serde(default)]
    faithfulness: Option<f32>,
    #[serde(default)]
    faithfulness_explanation: Option<String>,
    #[serde(default)]
    reasoning: Option<f32>,
    #[serde(default)]
    reasoning_explanation: Option<String>,
    #[serde(default)]
    context_utilization: Option<f32>,
    #[serde(default)]
    context_utilization_explanation: Option<String>
});

impl QuestionMetrics {
    pub fn new(
        model_result_id: String,
        accuracy: Option<JudgeScore>,
        faithfulness: Option<JudgeScore>,
        reasoning: Option<JudgeScore>,
        context_utilization: Option<JudgeScore>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            model_result_id,
            accuracy: accuracy.as_ref().map(|j| j.score),
            accuracy_explanation: accuracy.map(|j| j.explanation),
            faithfulness: faithfulness.as_ref().map(|j| j.score),
            faithfulness_explanation: faithfulness.map(|j| j.explanation),
            reasoning: reasoning.as_ref().map(|j| j.score),
            reasoning_explanation: reasoning.map(|j| j.explanation),
            context_utilization: context_utilization.as_ref().map(|j| j.score),
            context_utilization_explanation: context_utilization.map(|j| j.explanation),
            created_at: now,
            updated_at: now,
        }
    }

    /// Weighted overall score (§3): `0.30*accuracy + 0.30*faithfulness + 0.20*reasoning +
    /// 0.20*context_utilization`, renormalized over whichever metrics are present. Returns `None`
    /// only if every metric is missing.
    pub fn overall_score(&self) -> Option<f32> {
        let weighted: Vec<(f32, f32)> = [
            (self.accuracy, 0.30),
            (self.faithfulness, 0.30),
            (self.reasoning, 0.20),
            (self.context_utilization, 0.20),
        ]
        .into_iter()
        .filter_map(|(value, weight)| value.map(|v| (v, weight)))
        .collect();

        if weighted.is_empty() {
            return None;
        }

        let weight_sum: f32 = weighted.iter().map(|(_, w)| w).sum();
        let score_sum: f32 = weighted.iter().map(|(v, w)| v * w).sum();
        Some(score_sum / weight_sum)
    }

    pub async fn create(self, db: &SurrealDbClient) -> Result<Self, AppError> {
        db.store_item(self)
            .await?
            .ok_or_else(|| AppError::InternalError("question metrics failed to persist".into()))
    }

    pub async fn get_for_model_result(
        model_result_id: &str,
        db: &SurrealDbClient,
    ) -> Result<Option<Self>, AppError> {
        let metrics: Vec<Self> = db
            .client
            .query("SELECT * FROM question_metrics WHERE model_result_id = $id")
            .bind(("id", model_result_id.to_string()))
            .await?
            .take(0)?;
        Ok(metrics.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overall_score_uses_full_weights_when_accuracy_present() {
        let metrics = QuestionMetrics::new(
            "mr1".into(),
            Some(JudgeScore::new(1.0, "exact match".into())),
            Some(JudgeScore::new(1.0, "grounded".into())),
            Some(JudgeScore::new(1.0, "sound".into())),
            Some(JudgeScore::new(1.0, "used context".into())),
        );
        assert!((metrics.overall_score().unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn overall_score_renormalizes_when_accuracy_absent() {
        let metrics = QuestionMetrics::new(
            "mr1".into(),
            None,
            Some(JudgeScore::new(1.0, "grounded".into())),
            Some(JudgeScore::new(0.0, "unsound".into())),
            Some(JudgeScore::new(0.0, "unused".into())),
        );
        // weights 0.30/0.20/0.20 renormalized over sum 0.70 => 1.0 * (0.30/0.70)
        let expected = 0.30 / 0.70;
        assert!((metrics.overall_score().unwrap() - expected).abs() < 1e-4);
    }

    #[test]
    fn score_clamps_to_unit_interval() {
        let score = JudgeScore::new(1.4, "over".into());
        assert_eq!(score.score, 1.0);
        let score = JudgeScore::new(-0.2, "under".into());
        assert_eq!(score.score, 0.0);
    }
}
