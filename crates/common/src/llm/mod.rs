//! Chat model abstraction
//!
//! Provides a unified interface over chat completion providers:
//! - Groq (default, OpenAI-compatible API)
//! - OpenAI and any other OpenAI-compatible endpoint
//! - Mock model for tests and offline runs

use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff, ExponentialBackoffBuilder};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use crate::models::Message;

const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";
const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// A generated reply and the tokens the provider billed for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub content: String,
    pub tokens: u32,
}

/// Trait for chat completion
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a reply for a prepared message list
    async fn complete(&self, messages: &[Message]) -> Result<Completion>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Client for OpenAI-compatible `/chat/completions` endpoints
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
    temperature: f32,
    max_retries: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: u32,
}

/// Outcome of a single request, split by whether retrying can help
enum RequestFailure {
    Transient(AppError),
    Permanent(AppError),
}

impl OpenAiCompatClient {
    /// Create a new client
    pub fn new(api_key: String, base_url: String, config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }

    fn backoff_policy(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(250))
            .with_max_interval(Duration::from_secs(4))
            .with_max_elapsed_time(Some(Duration::from_secs(60)))
            .build()
    }

    /// Make request with retry
    async fn request_with_retry(&self, messages: &[Message]) -> Result<Completion> {
        let attempts = AtomicU32::new(0);
        let attempts = &attempts;
        let max_retries = self.max_retries;

        retry(self.backoff_policy(), move || async move {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            match self.make_request(messages).await {
                Ok(completion) => Ok(completion),
                Err(RequestFailure::Transient(e)) if attempt < max_retries => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = max_retries,
                        error = %e,
                        "Chat completion failed, retrying"
                    );
                    Err(backoff::Error::transient(e))
                }
                Err(RequestFailure::Transient(e)) | Err(RequestFailure::Permanent(e)) => {
                    Err(backoff::Error::permanent(e))
                }
            }
        })
        .await
    }

    async fn make_request(&self, messages: &[Message]) -> std::result::Result<Completion, RequestFailure> {
        let url = format!("{}/chat/completions", self.base_url);

        let request = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                RequestFailure::Transient(AppError::Upstream {
                    message: format!("Request failed: {}", e),
                })
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = AppError::Upstream {
                message: format!("API error {}: {}", status, body),
            };
            return Err(if status.as_u16() == 429 || status.is_server_error() {
                RequestFailure::Transient(error)
            } else {
                RequestFailure::Permanent(error)
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            RequestFailure::Permanent(AppError::Upstream {
                message: format!("Failed to parse response: {}", e),
            })
        })?;

        parse_completion(parsed).map_err(RequestFailure::Permanent)
    }
}

fn parse_completion(response: ChatResponse) -> Result<Completion> {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| AppError::Upstream {
            message: "Empty response".to_string(),
        })?;

    Ok(Completion {
        content,
        tokens: response.usage.map_or(0, |u| u.total_tokens),
    })
}

#[async_trait]
impl ChatModel for OpenAiCompatClient {
    async fn complete(&self, messages: &[Message]) -> Result<Completion> {
        self.request_with_retry(messages).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Mock chat model for testing
///
/// Replies with canned text and remembers every prompt it was given.
pub struct MockChatModel {
    reply: String,
    tokens: Option<u32>,
    failure: Option<String>,
    delay: Option<Duration>,
    prompts: Mutex<Vec<Vec<Message>>>,
}

impl MockChatModel {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            tokens: None,
            failure: None,
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Report a fixed token count instead of a word count
    pub fn with_tokens(mut self, tokens: u32) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Sleep before answering, like a slow provider
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// A model whose every call fails with an upstream error
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::new("")
        }
    }

    /// Prompts received so far, oldest first
    pub fn prompts(&self) -> Vec<Vec<Message>> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn call_count(&self) -> usize {
        self.prompts().len()
    }
}

impl Default for MockChatModel {
    fn default() -> Self {
        Self::new("This is a mock reply.")
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn complete(&self, messages: &[Message]) -> Result<Completion> {
        match self.prompts.lock() {
            Ok(mut prompts) => prompts.push(messages.to_vec()),
            Err(poisoned) => poisoned.into_inner().push(messages.to_vec()),
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = &self.failure {
            return Err(AppError::Upstream {
                message: message.clone(),
            });
        }

        let tokens = self.tokens.unwrap_or_else(|| {
            let words: usize = messages
                .iter()
                .map(|m| m.content.split_whitespace().count())
                .sum::<usize>()
                + self.reply.split_whitespace().count();
            u32::try_from(words).unwrap_or(u32::MAX)
        });

        Ok(Completion {
            content: self.reply.clone(),
            tokens,
        })
    }

    fn model_name(&self) -> &str {
        "mock-chat"
    }
}

/// Create a chat model based on configuration
pub fn create_chat_model(config: &LlmConfig) -> Result<Arc<dyn ChatModel>> {
    let default_base = match config.provider.as_str() {
        "mock" => return Ok(Arc::new(MockChatModel::default())),
        "groq" => Some(GROQ_API_BASE),
        "openai" => Some(OPENAI_API_BASE),
        _ => None,
    };

    let base_url = match (config.api_base.as_deref(), default_base) {
        (Some(base), _) | (None, Some(base)) => base.to_string(),
        (None, None) => {
            tracing::warn!(provider = %config.provider, "Unknown chat provider, using mock");
            return Ok(Arc::new(MockChatModel::default()));
        }
    };

    let api_key = config
        .api_key
        .clone()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::Configuration {
            message: format!("llm.api_key is required for provider '{}'", config.provider),
        })?;

    tracing::info!(
        provider = %config.provider,
        model = %config.model,
        base_url = %base_url,
        "Chat model configured"
    );

    Ok(Arc::new(OpenAiCompatClient::new(api_key, base_url, config)?))
}
