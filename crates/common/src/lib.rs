//! DocChat Common Library
//!
//! Shared code for the DocChat services including:
//! - Conversation, message and document models
//! - Repository interfaces and the in-memory store
//! - Context budgeting and prompt assembly
//! - Chat model client abstraction
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod context;
pub mod errors;
pub mod llm;
pub mod metrics;
pub mod models;
pub mod repository;

// Re-export commonly used types
pub use errors::{AppError, Result};
pub use crate::config::AppConfig;
pub use context::{PreparedPrompt, PromptInput};
pub use llm::{ChatModel, Completion};
pub use models::{Message, Role};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default system directive prepended to every prompt
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
