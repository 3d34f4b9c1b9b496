use std::time::Duration;

use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs},
};
use async_trait::async_trait;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};

use crate::error::{LessonError, LessonResult, is_throttling_message};

/// Base URL of Gemini's OpenAI-compatible endpoint.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

const TEXT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A single-shot text generation call against some model vendor.
///
/// Implementations perform exactly one vendor request per call; spacing,
/// quotas and retries are layered on top by
/// [`RateLimitedClient`](crate::rate_limit::RateLimitedClient).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Sends `prompt` as a single user message and returns the model's text.
    async fn generate(&self, prompt: &str) -> LessonResult<String>;
}

/// An implementation of `TextGenerator` for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the OpenAI client, including API key and base URL.
    /// * `model` - The model identifier to use for chat completions (e.g., "gemini-1.5-flash").
    pub fn new(config: OpenAIConfig, model: String) -> LessonResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(TEXT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LessonError::Configuration(e.to_string()))?;

        Ok(Self {
            client: Client::with_config(config)
                .with_http_client(http)
                .with_backoff(single_attempt()),
            model,
        })
    }

    /// Convenience constructor for Gemini's OpenAI-compatible endpoint.
    pub fn gemini(api_key: &str, model: String) -> LessonResult<Self> {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(GEMINI_API_BASE);
        Self::new(config, model)
    }

    pub fn openai(api_key: &str, model: String) -> LessonResult<Self> {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(OPENAI_API_BASE);
        Self::new(config, model)
    }
}

#[async_trait]
impl TextGenerator for OpenAICompatibleClient {
    async fn generate(&self, prompt: &str) -> LessonResult<String> {
        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(map_openai_error)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![message.into()])
            .build()
            .map_err(map_openai_error)?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(map_openai_error)?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LessonError::Upstream("Model response had no text content".into()))
    }
}

/// Gives up after the first failure. Throttling retries belong to
/// [`RateLimitedClient`](crate::rate_limit::RateLimitedClient).
fn single_attempt() -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_max_elapsed_time(Some(Duration::ZERO))
        .build()
}

/// Classifies a vendor error as throttling or a generic upstream failure.
fn map_openai_error(err: OpenAIError) -> LessonError {
    let throttled = match &err {
        OpenAIError::Reqwest(e) => e.status().is_some_and(|s| s.as_u16() == 429),
        OpenAIError::ApiError(api) => api.r#type.as_deref().is_some_and(is_throttling_message),
        _ => false,
    };

    let message = err.to_string();
    if throttled || is_throttling_message(&message) {
        LessonError::Throttled(message)
    } else {
        LessonError::Upstream(message)
    }
}
