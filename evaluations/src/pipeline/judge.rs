use common::storage::types::{question_metrics::JudgeScore, test_question::TestQuestion};
use serde::Deserialize;
use serde_json::{json, Value};

/// One of the four quality dimensions a judge call scores (§3, §4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JudgeMetric {
    Accuracy,
    Faithfulness,
    Reasoning,
    ContextUtilization,
}

impl JudgeMetric {
    pub fn label(self) -> &'static str {
        match self {
            Self::Accuracy => "accuracy",
            Self::Faithfulness => "faithfulness",
            Self::Reasoning => "reasoning",
            Self::ContextUtilization => "context_utilization",
        }
    }

    fn instruction(self) -> &'static str {
        match self {
            Self::Accuracy => {
                "Judge whether the answer is semantically correct compared to the expected answer. \
                 Score 1.0 for a fully correct answer, 0.0 for a completely wrong one."
            }
            Self::Faithfulness => {
                "Judge whether every claim in the answer is grounded in the retrieved context. \
                 Score 1.0 if there is no hallucination, 0.0 if the answer fabricates claims the \
                 context does not support."
            }
            Self::Reasoning => {
                "Judge the quality of the logical flow of the answer, independent of factual \
                 correctness. Score 1.0 for sound, well-structured reasoning, 0.0 for incoherent \
                 reasoning."
            }
            Self::ContextUtilization => {
                "Judge how effectively the answer uses the information available in the retrieved \
                 context. Score 1.0 if the answer draws on the relevant parts of the context, 0.0 \
                 if it ignores context that was available and relevant."
            }
        }
    }
}

/// Builds the metric-specific judge prompt (§4.E step 3). Always asks for the strict
/// `{score, explanation}` object that `score_schema()` enforces via `ResponseFormat::JsonSchema`.
pub fn build_prompt(
    metric: JudgeMetric,
    question: &TestQuestion,
    retrieved_context: &str,
    generated_answer: &str,
) -> String {
    let expected = question.expected_answer.as_deref().unwrap_or("(not provided)");
    format!(
        "{instruction}\n\n\
         Question: {question}\n\n\
         Retrieved context: {context}\n\n\
         Expected answer: {expected}\n\n\
         Candidate answer: {answer}\n\n\
         Respond with a JSON object containing a numeric \"score\" between 0 and 1 and a short \
         \"explanation\" string.",
        instruction = metric.instruction(),
        question = question.question_text,
        context = retrieved_context,
        expected = expected,
        answer = generated_answer,
    )
}

/// Strict JSON schema for `ResponseFormat::JsonSchema` (§4.E, resolves Open Question (b)).
pub fn score_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "score": { "type": "number" },
            "explanation": { "type": "string" }
        },
        "required": ["score", "explanation"],
        "additionalProperties": false
    })
}

#[derive(Debug, Deserialize)]
struct RawJudgeScore {
    score: f32,
    explanation: String,
}

/// Parses a judge response into a clamped `JudgeScore`, or `None` if it isn't the expected shape.
pub fn parse_score(text: &str) -> Option<JudgeScore> {
    let raw: RawJudgeScore = serde_json::from_str(text).ok()?;
    Some(JudgeScore::new(raw.score, raw.explanation))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_score() {
        let score = parse_score(r#"{"score": 0.8, "explanation": "mostly correct"}"#).unwrap();
        assert!((score.score - 0.8).abs() < 1e-6);
        assert_eq!(score.explanation, "mostly correct");
    }

    #[test]
    fn rejects_malformed_score() {
        assert!(parse_score("not json").is_none());
        assert!(parse_score(r#"{"score": "high"}"#).is_none());
    }

    #[test]
    fn clamps_out_of_range_score() {
        let score = parse_score(r#"{"score": 1.5, "explanation": "over"}"#).unwrap();
        assert_eq!(score.score, 1.0);
    }
}
