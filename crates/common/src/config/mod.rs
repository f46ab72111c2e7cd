//! Configuration management for DocChat services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{AppError, Result};

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Chat model provider configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Chunking and retrieval parameters
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Conversation context budget
    #[serde(default)]
    pub context: ContextConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Largest accepted upload in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Owner assigned to conversations created through the API
    #[serde(default = "default_owner")]
    pub default_owner: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Provider: groq, openai, mock
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// API key for the provider
    pub api_key: Option<String>,

    /// API base URL (for custom OpenAI-compatible endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Maximum tokens generated per reply
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries for transient failures
    #[serde(default = "default_llm_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Accumulated word length at which a chunk is sealed
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Number of chunks handed to the model
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContextConfig {
    /// Estimated-token budget for conversation history
    #[serde(default = "default_context_max_tokens")]
    pub max_tokens: usize,

    /// System directive prepended to every prompt
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (global)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_request_timeout() -> u64 { 60 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_max_upload_bytes() -> usize { 10 * 1024 * 1024 }
fn default_owner() -> String { "demo-user".to_string() }
fn default_llm_provider() -> String { "groq".to_string() }
fn default_llm_model() -> String { "llama-3.3-70b-versatile".to_string() }
fn default_llm_max_tokens() -> u32 { 1024 }
fn default_temperature() -> f32 { 0.7 }
fn default_llm_timeout() -> u64 { 30 }
fn default_llm_retries() -> u32 { 3 }
fn default_chunk_size() -> usize { 500 }
fn default_top_k() -> usize { 3 }
fn default_context_max_tokens() -> usize { 3000 }
fn default_system_prompt() -> String { crate::DEFAULT_SYSTEM_PROMPT.to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "docchat".to_string() }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_enabled() -> bool { true }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            max_upload_bytes: default_max_upload_bytes(),
            default_owner: default_owner(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            api_key: None,
            api_base: None,
            model: default_llm_model(),
            max_tokens: default_llm_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout(),
            max_retries: default_llm_retries(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            top_k: default_top_k(),
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_context_max_tokens(),
            system_prompt: default_system_prompt(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__RETRIEVAL__TOP_K=5
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        let mut config: Self = config.try_deserialize()?;
        config.apply_provider_env();
        Ok(config)
    }

    /// Fall back to the provider's conventional key variable
    fn apply_provider_env(&mut self) {
        if self.llm.api_key.is_some() {
            return;
        }
        let var = match self.llm.provider.as_str() {
            "groq" => "GROQ_API_KEY",
            "openai" => "OPENAI_API_KEY",
            _ => return,
        };
        self.llm.api_key = std::env::var(var).ok().filter(|k| !k.is_empty());
    }

    /// Reject settings the context core cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.chunk_size == 0 {
            return Err(AppError::Configuration {
                message: "retrieval.chunk_size must be greater than zero".to_string(),
            });
        }
        if self.context.max_tokens == 0 {
            return Err(AppError::Configuration {
                message: "context.max_tokens must be greater than zero".to_string(),
            });
        }
        if self.server.request_timeout_secs == 0 {
            return Err(AppError::Configuration {
                message: "server.request_timeout_secs must be greater than zero".to_string(),
            });
        }
        if self.server.port == 0 {
            return Err(AppError::Configuration {
                message: "server.port must be set".to_string(),
            });
        }
        if self.rate_limit.enabled && self.rate_limit.requests_per_second == 0 {
            return Err(AppError::Configuration {
                message: "rate_limit.requests_per_second must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Deadline for one model call, retries included.
    ///
    /// Four fifths of the request timeout, so a slow provider surfaces as a
    /// model-call error before the gateway timeout cuts the request off.
    pub fn model_call_timeout(&self) -> Duration {
        self.request_timeout() * 4 / 5
    }
}
