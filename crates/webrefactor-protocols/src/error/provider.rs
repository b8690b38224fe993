//! Transport errors raised by LLM providers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("API request failed ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Rate limited: retry after {retry_after_seconds} seconds")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Unexpected response shape: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// Classify a non-2xx HTTP response. `retry_after` is the parsed
    /// `Retry-After` header, when the server sent one.
    pub fn from_api_response(status: u16, message: String, retry_after: Option<u64>) -> Self {
        match status {
            401 | 403 => Self::AuthenticationFailed(message),
            429 => Self::RateLimited {
                retry_after_seconds: retry_after.unwrap_or(0),
            },
            400 | 404 | 422 => Self::InvalidRequest(message),
            _ => Self::ApiError { status, message },
        }
    }

    /// Classify a request that never produced a response.
    pub fn transport(message: impl Into<String>, timed_out: bool) -> Self {
        if timed_out {
            Self::Timeout
        } else {
            Self::Network(message.into())
        }
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
