use std::time::Instant;

use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::error::AppError;

use super::{GenerationRequest, GenerationResponse, Generator};

/// Generator backed by any OpenAI-compatible chat-completions endpoint. Covers OpenAI itself and
/// any provider exposing the same wire format against a different `base_url` (Together,
/// Mistral's OpenAI-compatible endpoint, HuggingFace TGI's OpenAI-compatible routes).
pub struct OpenAiCompatGenerator {
    provider_name: String,
    client: Client<OpenAIConfig>,
}

impl OpenAiCompatGenerator {
    pub fn new(provider_name: impl Into<String>, client: Client<OpenAIConfig>) -> Self {
        Self {
            provider_name: provider_name.into(),
            client,
        }
    }

    fn provider_error(&self, model: &str, err: &async_openai::error::OpenAIError) -> AppError {
        use async_openai::error::OpenAIError;
        let detail = err.to_string();
        match err {
            OpenAIError::ApiError(api_err) => {
                let code = api_err.code.as_deref().unwrap_or_default();
                if code.contains("auth") || api_err.r#type.as_deref() == Some("invalid_request_error") && detail.contains("key") {
                    AppError::ProviderAuth {
                        provider: self.provider_name.clone(),
                        model: model.to_string(),
                        detail,
                    }
                } else if code.contains("rate_limit") {
                    AppError::ProviderRateLimited {
                        provider: self.provider_name.clone(),
                        model: model.to_string(),
                        detail,
                    }
                } else {
                    AppError::ProviderBadRequest {
                        provider: self.provider_name.clone(),
                        model: model.to_string(),
                        detail,
                    }
                }
            }
            OpenAIError::Reqwest(_) => AppError::ProviderUnavailable {
                provider: self.provider_name.clone(),
                model: model.to_string(),
                detail,
            },
            _ => AppError::ProviderBadRequest {
                provider: self.provider_name.clone(),
                model: model.to_string(),
                detail,
            },
        }
    }
}

#[async_trait]
impl Generator for OpenAiCompatGenerator {
    fn provider_name(&self) -> &str {
        &self.provider_name
    }

    async fn generate(&self, req: GenerationRequest) -> Result<GenerationResponse, AppError> {
        let mut messages = Vec::new();
        if let Some(system) = &req.system {
            messages.push(ChatCompletionRequestSystemMessage::from(system.as_str()).into());
        }
        messages.push(ChatCompletionRequestUserMessage::from(req.prompt.as_str()).into());

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&req.model)
            .temperature(req.temperature)
            .max_tokens(req.max_tokens)
            .messages(messages);

        if let Some(schema) = &req.json_schema {
            builder.response_format(async_openai::types::ResponseFormat::JsonSchema {
                json_schema: async_openai::types::ResponseFormatJsonSchema {
                    description: None,
                    name: "structured_output".to_string(),
                    schema: Some(schema.clone()),
                    strict: Some(true),
                },
            });
        }

        let request = builder
            .build()
            .map_err(|err| self.provider_error(&req.model, &err))?;

        let started = Instant::now();
        let timeout = tokio::time::Duration::from_secs(req.timeout_secs);
        let response = tokio::time::timeout(timeout, self.client.chat().create(request))
            .await
            .map_err(|_| AppError::ProviderTimeout {
                provider: self.provider_name.clone(),
                model: req.model.clone(),
                elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            })?
            .map_err(|err| self.provider_error(&req.model, &err))?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| AppError::LLMParsing("no choices in completion response".into()))?;
        let text = choice.message.content.clone().unwrap_or_default();
        let usage = response.usage.as_ref();

        Ok(GenerationResponse {
            text,
            prompt_tokens: usage.map(|u| u.prompt_tokens).unwrap_or_default(),
            completion_tokens: usage.map(|u| u.completion_tokens).unwrap_or_default(),
        })
    }
}
