//! Error types for sage-ai

use thiserror::Error;

/// Result type alias using sage-ai Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the completion service
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API returned an error response
    #[error("API error: {message} (type: {error_type})")]
    Api { error_type: String, message: String },

    /// Rate limit exceeded
    #[error("Rate limited: retry after {retry_after:?} seconds")]
    RateLimited { retry_after: Option<u64> },

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Invalid API key
    #[error("Invalid or missing API key")]
    InvalidApiKey,

    /// Server-sent events error
    #[error("SSE error: {0}")]
    Sse(String),

    /// Unexpected response format
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Model not found
    #[error("Model not found: {0}")]
    ModelNotFound(String),
}

impl Error {
    /// Create an API error from type and message
    pub fn api(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            error_type: error_type.into(),
            message: message.into(),
        }
    }

    /// Check if this error means the requested model id was rejected
    pub fn is_model_not_found(&self) -> bool {
        match self {
            Error::ModelNotFound(_) => true,
            Error::Api {
                error_type,
                message,
            } => {
                error_type.eq_ignore_ascii_case("model_not_found")
                    || message.to_lowercase().contains("does not exist")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_not_found_typed_variant() {
        assert!(Error::ModelNotFound("gpt-9".into()).is_model_not_found());
    }

    #[test]
    fn test_model_not_found_api_error_type() {
        let e = Error::api("model_not_found", "The model `gpt-9` was not found");
        assert!(e.is_model_not_found());
    }

    #[test]
    fn test_model_not_found_api_message() {
        let e = Error::api(
            "invalid_request_error",
            "The model `gpt-9` does not exist or you do not have access to it",
        );
        assert!(e.is_model_not_found());
    }

    #[test]
    fn test_not_model_not_found() {
        assert!(!Error::InvalidApiKey.is_model_not_found());
        assert!(!Error::RateLimited { retry_after: None }.is_model_not_found());
        assert!(!Error::api("authentication_error", "Invalid API key").is_model_not_found());
    }
}
