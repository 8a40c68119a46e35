use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

use super::{GenerationRequest, GenerationResponse, Generator};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Generator for Anthropic's Messages API, which uses its own request/response shape rather than
/// the OpenAI-compatible chat-completions format.
pub struct AnthropicGenerator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicGenerator {
    pub fn new(api_key: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<MessageIn<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

#[derive(Serialize)]
struct MessageIn<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Deserialize)]
struct AnthropicErrorBody {
    error: AnthropicErrorDetail,
}

#[derive(Deserialize)]
struct AnthropicErrorDetail {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

#[async_trait]
impl Generator for AnthropicGenerator {
    fn provider_name(&self) -> &str {
        "anthropic"
    }

    async fn generate(&self, req: GenerationRequest) -> Result<GenerationResponse, AppError> {
        if self.api_key.is_empty() {
            return Err(AppError::ProviderAuth {
                provider: "anthropic".to_string(),
                model: req.model.clone(),
                detail: "missing api key".to_string(),
            });
        }

        let body = MessagesRequest {
            model: &req.model,
            max_tokens: req.max_tokens,
            temperature: req.temperature,
            messages: vec![MessageIn {
                role: "user",
                content: &req.prompt,
            }],
            system: req.system.as_deref(),
        };

        let started = Instant::now();
        let timeout = std::time::Duration::from_secs(req.timeout_secs);
        let response = tokio::time::timeout(
            timeout,
            self.client
                .post(format!("{}/messages", self.base_url))
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body)
                .send(),
        )
        .await
        .map_err(|_| AppError::ProviderTimeout {
            provider: "anthropic".to_string(),
            model: req.model.clone(),
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        })?
        .map_err(|err| AppError::ProviderUnavailable {
            provider: "anthropic".to_string(),
            model: req.model.clone(),
            detail: err.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body: Result<AnthropicErrorBody, _> = response.json().await;
            let detail = body
                .map(|b| b.error.message)
                .unwrap_or_else(|_| format!("http {status}"));
            return Err(match status.as_u16() {
                401 | 403 => AppError::ProviderAuth {
                    provider: "anthropic".to_string(),
                    model: req.model.clone(),
                    detail,
                },
                429 => AppError::ProviderRateLimited {
                    provider: "anthropic".to_string(),
                    model: req.model.clone(),
                    detail,
                },
                400 | 404 | 422 => AppError::ProviderBadRequest {
                    provider: "anthropic".to_string(),
                    model: req.model.clone(),
                    detail,
                },
                _ => AppError::ProviderUnavailable {
                    provider: "anthropic".to_string(),
                    model: req.model.clone(),
                    detail,
                },
            });
        }

        let parsed: MessagesResponse =
            response
                .json()
                .await
                .map_err(|err| AppError::LLMParsing(format!("anthropic response: {err}")))?;

        let text = parsed
            .content
            .into_iter()
            .map(|b| b.text)
            .collect::<Vec<_>>()
            .join("");

        Ok(GenerationResponse {
            text,
            prompt_tokens: parsed.usage.input_tokens,
            completion_tokens: parsed.usage.output_tokens,
        })
    }
}
