use std::sync::{Arc, Mutex};

use async_openai::types::CreateEmbeddingRequestArgs;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::debug;

use crate::error::AppError;
use crate::utils::config::AppConfig;
use crate::utils::providers::retry::with_provider_retry;

/// Embedding capability (§4.A), kept distinct from `providers::Generator` because a workspace
/// locks onto one embedding provider/model/dimension for its whole lifetime (§3) while generation
/// providers are selected per evaluation candidate.
pub enum EmbeddingProvider {
    OpenAi {
        client: async_openai::Client<async_openai::config::OpenAIConfig>,
        model: String,
        dimension: usize,
    },
    /// Local, deterministic, free embeddings (BGE family via `fastembed`). `fastembed`'s model
    /// handle is `!Sync`, hence the mutex to share one instance across concurrent callers.
    LocalBge {
        model: Arc<Mutex<TextEmbedding>>,
        dimension: usize,
    },
}

impl EmbeddingProvider {
    pub fn openai(
        client: async_openai::Client<async_openai::config::OpenAIConfig>,
        model: impl Into<String>,
        dimension: usize,
    ) -> Self {
        Self::OpenAi {
            client,
            model: model.into(),
            dimension,
        }
    }

    pub fn local_bge() -> Result<Self, AppError> {
        let model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::BGESmallENV15).with_show_download_progress(false),
        )
        .map_err(|err| AppError::InternalError(format!("failed to load local embedding model: {err}")))?;

        Ok(Self::LocalBge {
            model: Arc::new(Mutex::new(model)),
            dimension: 384,
        })
    }

    /// Builds the provider a Workspace is configured to use. `embedding_provider` is one of
    /// `"openai"` or `"local-bge"`; `embedding_model` names the model for the OpenAI path and is
    /// ignored for the fixed local model.
    pub fn from_config(
        config: &AppConfig,
        embedding_provider: &str,
        embedding_model: &str,
        dimension: usize,
        openai_client: Option<async_openai::Client<async_openai::config::OpenAIConfig>>,
    ) -> Result<Self, AppError> {
        match embedding_provider {
            "local-bge" => Self::local_bge(),
            "openai" => {
                let client = openai_client.unwrap_or_else(|| {
                    let cfg = async_openai::config::OpenAIConfig::new()
                        .with_api_key(&config.openai_api_key)
                        .with_api_base(&config.openai_base_url);
                    async_openai::Client::with_config(cfg)
                });
                Ok(Self::openai(client, embedding_model, dimension))
            }
            other => Err(AppError::InputInvalid(format!(
                "unknown embedding provider: {other}"
            ))),
        }
    }

    pub fn backend_label(&self) -> &str {
        match self {
            Self::OpenAi { .. } => "openai",
            Self::LocalBge { .. } => "local-bge",
        }
    }

    pub fn dimension(&self) -> usize {
        match self {
            Self::OpenAi { dimension, .. } | Self::LocalBge { dimension, .. } => *dimension,
        }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        Ok(self.embed_batch(std::slice::from_ref(&text.to_string())).await?.remove(0))
    }

    /// Embeds a batch of texts. Batch size bounding (§4.D) is the caller's responsibility
    /// (`utils::chunking` callers keep batches bounded before reaching this call).
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        match self {
            Self::OpenAi {
                client,
                model,
                dimension,
            } => {
                with_provider_retry("embed:openai", || {
                    generate_embeddings_openai(client, texts, model, *dimension)
                })
                .await
            }
            Self::LocalBge { model, .. } => {
                let model = Arc::clone(model);
                let texts = texts.to_vec();
                tokio::task::spawn_blocking(move || {
                    let mut guard = model
                        .lock()
                        .map_err(|_| AppError::InternalError("embedding model lock poisoned".into()))?;
                    guard
                        .embed(texts, None)
                        .map_err(|err| AppError::InternalError(format!("local embedding failed: {err}")))
                })
                .await
                .map_err(AppError::from)?
            }
        }
    }
}

async fn generate_embeddings_openai(
    client: &async_openai::Client<async_openai::config::OpenAIConfig>,
    texts: &[String],
    model: &str,
    dimensions: usize,
) -> Result<Vec<Vec<f32>>, AppError> {
    let request = CreateEmbeddingRequestArgs::default()
        .model(model)
        .dimensions(u32::try_from(dimensions).unwrap_or(u32::MAX))
        .input(texts.to_vec())
        .build()
        .map_err(|err| AppError::ProviderBadRequest {
            provider: "openai".to_string(),
            model: model.to_string(),
            detail: err.to_string(),
        })?;

    let response = client.embeddings().create(request).await.map_err(|err| {
        AppError::ProviderUnavailable {
            provider: "openai".to_string(),
            model: model.to_string(),
            detail: err.to_string(),
        }
    })?;

    debug!(count = response.data.len(), "generated batch of embeddings");

    Ok(response.data.into_iter().map(|d| d.embedding).collect())
}
