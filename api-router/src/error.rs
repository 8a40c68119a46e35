use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::error::AppError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Serialize, Clone)]
pub enum ApiError {
    #[error("Internal server error")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("State conflict: {0}")]
    Conflict(String),

    #[error("Upstream provider error: {0}")]
    ProviderError(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::NotFound(msg) => Self::NotFound(msg),
            AppError::InputInvalid(msg) | AppError::Validation(msg) => Self::ValidationError(msg),
            AppError::StateConflict(msg) => Self::Conflict(msg),
            AppError::ExtractEmpty(msg) => Self::ValidationError(msg),
            AppError::IndexSchemaConflict { expected, actual } => Self::ValidationError(format!(
                "index expects vectors of dimension {expected}, got {actual}"
            )),
            AppError::ProviderAuth { provider, model, detail }
            | AppError::ProviderBadRequest { provider, model, detail } => {
                Self::ValidationError(format!("{provider}/{model}: {detail}"))
            }
            AppError::ProviderRateLimited { provider, model, detail }
            | AppError::ProviderUnavailable { provider, model, detail } => {
                Self::ProviderError(format!("{provider}/{model}: {detail}"))
            }
            AppError::ProviderTimeout { provider, model, elapsed_ms } => {
                Self::ProviderError(format!("{provider}/{model} timed out after {elapsed_ms}ms"))
            }
            other => {
                tracing::error!(error = %other, "internal error surfaced at the API boundary");
                Self::InternalError("Internal server error".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match self {
            Self::InternalError(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse { error: message, status: "error".to_string() },
            ),
            Self::ValidationError(message) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse { error: message, status: "error".to_string() },
            ),
            Self::NotFound(message) => (
                StatusCode::NOT_FOUND,
                ErrorResponse { error: message, status: "error".to_string() },
            ),
            Self::Conflict(message) => (
                StatusCode::CONFLICT,
                ErrorResponse { error: message, status: "error".to_string() },
            ),
            Self::ProviderError(message) => (
                StatusCode::BAD_GATEWAY,
                ErrorResponse { error: message, status: "error".to_string() },
            ),
            Self::PayloadTooLarge(message) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                ErrorResponse { error: message, status: "error".to_string() },
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

#[derive(Serialize, Debug)]
struct ErrorResponse {
    error: String,
    status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_status_code<T: IntoResponse>(response: T, expected_status: StatusCode) {
        let response = response.into_response();
        assert_eq!(response.status(), expected_status);
    }

    #[test]
    fn app_error_maps_to_expected_api_error() {
        let not_found = AppError::NotFound("workspace missing".into());
        assert!(matches!(ApiError::from(not_found), ApiError::NotFound(_)));

        let conflict = AppError::StateConflict("document already processing".into());
        assert!(matches!(ApiError::from(conflict), ApiError::Conflict(_)));

        let invalid = AppError::InputInvalid("missing content_type".into());
        assert!(matches!(ApiError::from(invalid), ApiError::ValidationError(_)));

        let provider_auth = AppError::ProviderAuth {
            provider: "openai".into(),
            model: "gpt-4o".into(),
            detail: "missing api key".into(),
        };
        assert!(matches!(ApiError::from(provider_auth), ApiError::ValidationError(_)));

        let provider_unavailable = AppError::ProviderUnavailable {
            provider: "openai".into(),
            model: "gpt-4o".into(),
            detail: "503".into(),
        };
        assert!(matches!(ApiError::from(provider_unavailable), ApiError::ProviderError(_)));
    }

    #[test]
    fn response_status_codes_match_error_kind() {
        assert_status_code(ApiError::InternalError("x".into()), StatusCode::INTERNAL_SERVER_ERROR);
        assert_status_code(ApiError::ValidationError("x".into()), StatusCode::BAD_REQUEST);
        assert_status_code(ApiError::NotFound("x".into()), StatusCode::NOT_FOUND);
        assert_status_code(ApiError::Conflict("x".into()), StatusCode::CONFLICT);
        assert_status_code(ApiError::ProviderError("x".into()), StatusCode::BAD_GATEWAY);
        assert_status_code(ApiError::PayloadTooLarge("x".into()), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn internal_error_message_is_not_leaked_to_client() {
        let sensitive = AppError::Processing("db password incorrect".into());
        let api_error = ApiError::from(sensitive);
        assert_eq!(api_error.to_string(), "Internal server error");
    }
}
