use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use common::storage::types::{
    evaluation_summary::EvaluationSummary, model_result::ModelResult, question_metrics::QuestionMetrics,
};
use serde_json::json;

use crate::{api_state::ApiState, error::ApiError};

/// Route: GET /results/{eval_id}/summary (§6). Candidate ranking, highest `overall_score` first.
pub async fn summary(
    State(state): State<ApiState>,
    Path(evaluation_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let ranked = EvaluationSummary::list_ranked(&evaluation_id, &state.db).await?;
    Ok(Json(json!({ "candidates": ranked })))
}

/// Route: GET /results/{eval_id}/detailed (§6). Every per-question model result, each annotated
/// with its judge-scored metrics when present.
pub async fn detailed(
    State(state): State<ApiState>,
    Path(evaluation_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let results = ModelResult::list_for_evaluation(&evaluation_id, &state.db).await?;

    let mut rows = Vec::with_capacity(results.len());
    for result in results {
        let metrics = QuestionMetrics::get_for_model_result(&result.id, &state.db).await?;
        rows.push(json!({
            "result": result,
            "metrics": metrics,
        }));
    }

    Ok(Json(json!({ "results": rows })))
}

/// Route: GET /results/{eval_id}/metrics-by-model (§6). Per-candidate results keyed by
/// `"{provider}/{model}"`.
pub async fn metrics_by_model(
    State(state): State<ApiState>,
    Path(evaluation_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let ranked = EvaluationSummary::list_ranked(&evaluation_id, &state.db).await?;

    let mut by_model: HashMap<String, Vec<ModelResult>> = HashMap::new();
    for candidate in &ranked {
        let key = format!("{}/{}", candidate.candidate_provider, candidate.candidate_model);
        let results = ModelResult::list_for_candidate(
            &evaluation_id,
            &candidate.candidate_provider,
            &candidate.candidate_model,
            &state.db,
        )
        .await?;
        by_model.insert(key, results);
    }

    Ok(Json(json!({ "by_model": by_model })))
}
