//! Errors raised while talking to the calculation service.

use thiserror::Error;

/// API errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Could not reach calculation service at {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Could not decode service response: {0}")]
    Decode(String),

    /// `success: false` envelope; `status` is set when it came with a non-2xx status
    #[error("Service rejected the request: {message}")]
    Rejected { status: Option<u16>, message: String },

    #[error("Service reported success without a payload")]
    MissingData,

    #[error("HTTP client error: {0}")]
    Client(String),

}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Rejection carried by a successful HTTP response.
    pub fn rejected(message: impl Into<String>) -> Self {
        ApiError::Rejected {
            status: None,
            message: message.into(),
        }
    }

    /// Whether a fresh attempt with the same inputs may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Connection(_) | ApiError::Timeout(_) => true,
            ApiError::Rejected { status: None, .. } => true,
            ApiError::Rejected {
                status: Some(status),
                ..
            }
            | ApiError::Http { status, .. } => *status >= 500,
            ApiError::Decode(_) | ApiError::MissingData | ApiError::Client(_) => false,
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Decode(e.to_string())
    }
}
