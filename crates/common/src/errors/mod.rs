//! Error types for DocChat services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - HTTP status code mapping
//! - Structured error responses with machine-readable codes

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::PreparedPrompt;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    ValidationError,
    InvalidFormat,
    PayloadTooLarge,
    EmptyDocument,
    ContextBudgetExceeded,

    // Resource errors
    ConversationNotFound,
    DocumentNotFound,

    RateLimited,

    // External service errors
    UpstreamError,
    ModelCallFailed,

    // Internal errors
    InternalError,
    ConfigurationError,
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>
    },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    #[error("Payload too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("No text could be extracted from document {filename}")]
    EmptyDocument { filename: String },

    #[error("Latest message needs ~{estimated_tokens:.1} tokens, exceeding the context budget of {budget}")]
    ContextBudgetExceeded { estimated_tokens: f64, budget: usize },

    // Resource errors
    #[error("Conversation not found: {id}")]
    ConversationNotFound { id: String },

    #[error("Document not found: {id}")]
    DocumentNotFound { id: String },

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // External service errors
    #[error("Model provider error: {message}")]
    Upstream { message: String },

    /// A model call failed after the prompt was prepared. The prompt is kept
    /// so the caller can see exactly what was about to be sent.
    #[error("Failed to generate response: {message}")]
    ModelCall {
        message: String,
        prompt: Box<PreparedPrompt>
    },

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::PayloadTooLarge { .. } => ErrorCode::PayloadTooLarge,
            AppError::EmptyDocument { .. } => ErrorCode::EmptyDocument,
            AppError::ContextBudgetExceeded { .. } => ErrorCode::ContextBudgetExceeded,
            AppError::ConversationNotFound { .. } => ErrorCode::ConversationNotFound,
            AppError::DocumentNotFound { .. } => ErrorCode::DocumentNotFound,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::Upstream { .. } => ErrorCode::UpstreamError,
            AppError::ModelCall { .. } => ErrorCode::ModelCallFailed,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } |
            AppError::InvalidFormat { .. } |
            AppError::EmptyDocument { .. } |
            AppError::ContextBudgetExceeded { .. } => StatusCode::BAD_REQUEST,

            // 404 Not Found
            AppError::ConversationNotFound { .. } |
            AppError::DocumentNotFound { .. } => StatusCode::NOT_FOUND,

            // 413 Payload Too Large
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::Internal { .. } |
            AppError::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::Upstream { .. } |
            AppError::ModelCall { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Extra structured context attached to the response body
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::Validation { field: Some(field), .. } => {
                Some(serde_json::json!({ "field": field }))
            }
            AppError::ModelCall { prompt, .. } => Some(serde_json::json!({
                "messages": prompt.messages,
                "sources": prompt.sources,
            })),
            _ => None,
        }
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details: self.details(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let field = err.field_errors().keys().next().map(|f| f.to_string());
        AppError::Validation {
            message: err.to_string(),
            field,
        }
    }
}

impl From<::config::ConfigError> for AppError {
    fn from(err: ::config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Message;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::ConversationNotFound { id: "test".into() };
        assert_eq!(err.code(), ErrorCode::ConversationNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_empty_document_is_validation_not_lookup() {
        let empty = AppError::EmptyDocument { filename: "scan.pdf".into() };
        let missing = AppError::DocumentNotFound { id: "42".into() };
        assert_eq!(empty.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
        assert_ne!(empty.code(), missing.code());
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::Validation {
            message: "Invalid content".into(),
            field: Some("content".into()),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
        assert_eq!(err.details(), Some(serde_json::json!({ "field": "content" })));
    }

    #[test]
    fn test_model_call_keeps_prompt() {
        let prompt = PreparedPrompt {
            messages: vec![Message::system("sys"), Message::user("question")],
            question: Some("question".into()),
            sources: vec!["chunk one".into()],
        };
        let err = AppError::ModelCall {
            message: "timeout".into(),
            prompt: Box::new(prompt),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert!(err.to_string().starts_with("Failed to generate response"));

        let details = err.details().unwrap();
        assert_eq!(details["sources"][0], "chunk one");
        assert_eq!(details["messages"][1]["role"], "user");
    }

    #[tokio::test]
    async fn test_response_body_carries_code_and_details() {
        let response = AppError::Validation {
            message: "content is empty".into(),
            field: Some("content".into()),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "error": {
                    "code": "VALIDATION_ERROR",
                    "message": "Validation failed: content is empty",
                    "details": { "field": "content" },
                }
            })
        );
    }

    #[test]
    fn test_server_error() {
        let err = AppError::Internal {
            message: "Something went wrong".into()
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_server_error());
    }
}
