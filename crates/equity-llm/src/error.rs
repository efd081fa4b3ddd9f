//! Error types for LLM operations

use equity_core::{CapabilityError, CapabilityErrorKind};
use thiserror::Error;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Error, Debug)]
pub enum LLMError {
    /// API request failed
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Invalid API key or authentication failed
    #[error("Invalid API key or authentication failed")]
    AuthenticationFailed,

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Model not found
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// HTTP error
    #[cfg(feature = "openai")]
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The request did not complete in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Unexpected response format
    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl LLMError {
    /// The capability error kind this failure is reported as
    pub fn kind(&self) -> CapabilityErrorKind {
        match self {
            LLMError::RateLimitExceeded(_) => CapabilityErrorKind::BudgetExceeded,
            LLMError::Timeout(_) => CapabilityErrorKind::Timeout,
            LLMError::SerializationError(_) | LLMError::UnexpectedResponse(_) => {
                CapabilityErrorKind::MalformedData
            }
            LLMError::InvalidRequest(_) | LLMError::ConfigurationError(_) => {
                CapabilityErrorKind::Internal
            }
            #[cfg(feature = "openai")]
            LLMError::HttpError(err) if err.is_timeout() => CapabilityErrorKind::Timeout,
            #[cfg(feature = "openai")]
            LLMError::HttpError(err) if err.is_decode() => CapabilityErrorKind::MalformedData,
            _ => CapabilityErrorKind::Unavailable,
        }
    }
}

impl From<LLMError> for CapabilityError {
    fn from(err: LLMError) -> Self {
        CapabilityError::new(err.kind(), err.to_string())
    }
}
