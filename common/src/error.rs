use async_openai::error::OpenAIError;
use thiserror::Error;
use tokio::task::JoinError;

/// Central error type for the core pipelines. Each variant maps to the taxonomy's most specific
/// kind; HTTP boundaries (`api-router`) translate these into status codes.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),
    #[error("OpenAI error: {0}")]
    OpenAI(#[from] OpenAIError),
    #[error("Object storage error: {0}")]
    Storage(#[from] object_store::Error),
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed request, unsupported file type, missing required field.
    #[error("Invalid input: {0}")]
    InputInvalid(String),
    /// Operation forbidden in the entity's current state (re-process a completed Document,
    /// change a Workspace's embedding model after vectors exist, re-open a terminal Evaluation).
    #[error("State conflict: {0}")]
    StateConflict(String),

    /// Provider credential missing or rejected. Fails fast, not retried.
    #[error("Provider auth error ({provider}/{model}): {detail}")]
    ProviderAuth {
        provider: String,
        model: String,
        detail: String,
    },
    /// Provider rate limit hit. Retried with backoff.
    #[error("Provider rate limited ({provider}/{model}): {detail}")]
    ProviderRateLimited {
        provider: String,
        model: String,
        detail: String,
    },
    /// Provider call exceeded its deadline. Retried with backoff.
    #[error("Provider timeout ({provider}/{model}) after {elapsed_ms}ms")]
    ProviderTimeout {
        provider: String,
        model: String,
        elapsed_ms: u64,
    },
    /// Provider unreachable or returned a 5xx. Retried with backoff.
    #[error("Provider unavailable ({provider}/{model}): {detail}")]
    ProviderUnavailable {
        provider: String,
        model: String,
        detail: String,
    },
    /// Provider rejected the request as malformed. Fails fast, not retried.
    #[error("Provider bad request ({provider}/{model}): {detail}")]
    ProviderBadRequest {
        provider: String,
        model: String,
        detail: String,
    },

    /// Vector dimension mismatch on upsert into a workspace-scoped index.
    #[error("Index schema conflict: expected dimension {expected}, got {actual}")]
    IndexSchemaConflict { expected: usize, actual: usize },
    /// No text could be extracted from a document's source bytes.
    #[error("No extractable text: {0}")]
    ExtractEmpty(String),

    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Authorization error: {0}")]
    Auth(String),
    #[error("LLM output parsing error: {0}")]
    LLMParsing(String),
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("Ingestion processing error: {0}")]
    Processing(String),
    #[error("DOM smoothie error: {0}")]
    DomSmoothie(#[from] dom_smoothie::ReadabilityError),
    /// Unexpected internal failure, surfaced as an opaque 5xx.
    #[error("Internal service error: {0}")]
    InternalError(String),
    /// The resource a background run depended on (its Workspace or Evaluation) was deleted
    /// mid-run; in-flight units were cancelled at the next suspension point.
    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl AppError {
    /// Whether a provider failure is retriable under the §4.A backoff policy
    /// (`ProviderRateLimited`, `ProviderTimeout`, `ProviderUnavailable`). Other provider failures
    /// (`ProviderAuth`, `ProviderBadRequest`) are terminal.
    pub fn is_retriable_provider_error(&self) -> bool {
        matches!(
            self,
            AppError::ProviderRateLimited { .. }
                | AppError::ProviderTimeout { .. }
                | AppError::ProviderUnavailable { .. }
        )
    }
}
