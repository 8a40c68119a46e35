use api_state::ApiState;
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post},
    Router,
};
use routes::{
    document::reprocess_document,
    evaluation::{add_question, create_dataset, create_evaluation, get_evaluation},
    liveness::live,
    rag::rag_query,
    readiness::ready,
    results::{detailed, metrics_by_model, summary},
    workspace::{create_workspace, list_documents, upload_document},
};

pub mod api_state;
pub mod error;
mod routes;

/// Router for API functionality, version 1 (§6). There is no auth layer: collaborator
/// authentication is out of scope (§1), so every route below is unauthenticated.
pub fn api_routes_v1<S>(app_state: &ApiState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    let probes = Router::new().route("/ready", get(ready)).route("/live", get(live));

    let workspace = Router::new()
        .route("/workspace/create", post(create_workspace))
        .route(
            "/workspace/{workspace_id}/upload",
            post(upload_document).layer(DefaultBodyLimit::max(app_state.config.upload_max_body_bytes)),
        )
        .route("/workspace/{workspace_id}/documents", get(list_documents));

    let rag = Router::new()
        .route("/rag/{document_id}/process", post(reprocess_document))
        .route("/rag/query", post(rag_query));

    let evaluation = Router::new()
        .route("/evaluation/dataset/create", post(create_dataset))
        .route("/evaluation/dataset/{dataset_id}/questions", post(add_question))
        .route("/evaluation/create", post(create_evaluation))
        .route("/evaluation/{evaluation_id}", get(get_evaluation));

    let results = Router::new()
        .route("/results/{eval_id}/summary", get(summary))
        .route("/results/{eval_id}/detailed", get(detailed))
        .route("/results/{eval_id}/metrics-by-model", get(metrics_by_model));

    probes.merge(workspace).merge(rag).merge(evaluation).merge(results)
}
