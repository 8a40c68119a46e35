use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use common::storage::types::{
    evaluation::{CandidateModel, Evaluation, EvaluationSettings},
    test_dataset::TestDataset,
    test_question::TestQuestion,
};
use evaluations::{spawn_run, EvaluationPipeline};
use serde::Deserialize;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct CreateDatasetRequest {
    pub workspace_id: String,
    pub name: String,
}

/// Route: POST /evaluation/dataset/create (§6).
pub async fn create_dataset(
    State(state): State<ApiState>,
    Json(input): Json<CreateDatasetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let dataset = TestDataset::new(input.workspace_id, input.name)
        .create(&state.db)
        .await?;
    Ok(Json(dataset))
}

#[derive(Debug, Deserialize)]
pub struct AddQuestionRequest {
    pub question_text: String,
    #[serde(default)]
    pub expected_answer: Option<String>,
    #[serde(default)]
    pub context_reference: Option<String>,
}

/// Route: POST /evaluation/dataset/{id}/questions (§6). Appends a question at the next
/// contiguous `question_index` for the dataset.
pub async fn add_question(
    State(state): State<ApiState>,
    Path(dataset_id): Path<String>,
    Json(input): Json<AddQuestionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    TestDataset::get(&dataset_id, &state.db).await?;

    let question_index = TestQuestion::next_index(&dataset_id, &state.db).await?;
    let question = TestQuestion::new(
        dataset_id,
        question_index,
        input.question_text,
        input.expected_answer,
        input.context_reference,
    )
    .create(&state.db)
    .await?;

    Ok(Json(question))
}

#[derive(Debug, Deserialize)]
pub struct CreateEvaluationRequest {
    pub dataset_id: String,
    pub candidate_models: Vec<CandidateModel>,
    pub judge_model: String,
    pub settings: EvaluationSettings,
}

/// Route: POST /evaluation/create (§6). Persists the Evaluation row in `pending` and fires the
/// run as a detached background task; the caller polls GET /evaluation/{id} for progress.
pub async fn create_evaluation(
    State(state): State<ApiState>,
    Json(input): Json<CreateEvaluationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    TestDataset::get(&input.dataset_id, &state.db).await?;

    let evaluation = Evaluation::new(
        input.dataset_id,
        input.candidate_models,
        input.judge_model,
        input.settings,
    )
    .create(&state.db)
    .await?;

    let pipeline = Arc::new(EvaluationPipeline::new(
        Arc::clone(&state.db),
        Arc::clone(&state.openai_client),
        state.config.clone(),
    ));
    spawn_run(pipeline, evaluation.id.clone());

    Ok(Json(evaluation))
}

/// Route: GET /evaluation/{id} (§6).
pub async fn get_evaluation(
    State(state): State<ApiState>,
    Path(evaluation_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let evaluation = Evaluation::get(&evaluation_id, &state.db).await?;
    Ok(Json(evaluation))
}
