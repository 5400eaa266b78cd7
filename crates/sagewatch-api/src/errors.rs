use sagewatch_core::ResourceKind;
use thiserror::Error;

/// API-specific errors for sagewatch-api
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("Core domain error: {0}")]
    Core(#[from] sagewatch_core::CoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Task failed: {0}")]
    Task(String),
}

impl ApiError {
    /// Machine-readable platform error code, when one is known.
    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Http(http) => http.code(),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum HttpError {
    #[error("{code}: {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Rate limited")]
    RateLimited,

    #[error("Service unavailable")]
    ServiceUnavailable,

    #[error("Request timeout")]
    Timeout,

    #[error("HTTP error {status}: {message}")]
    HttpError { status: u16, message: String },

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Signing error: {0}")]
    Signing(String),
}

impl HttpError {
    pub fn code(&self) -> Option<&str> {
        match self {
            HttpError::Service { code, .. } => Some(code.as_str()),
            HttpError::RateLimited => Some("ThrottlingException"),
            HttpError::Timeout => Some("RequestTimeout"),
            _ => None,
        }
    }
}

/// Outcome of classifying a failed provider call.
#[derive(Error, Debug)]
pub enum ClassifiedError {
    #[error("{0}")]
    Retryable(#[source] ApiError),

    #[error("{0}")]
    NonRetryable(#[source] ApiError),

    #[error("operation cancelled")]
    Cancelled,
}

impl ClassifiedError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClassifiedError::Retryable(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClassifiedError::Cancelled)
    }

    /// The underlying failure; `None` for a cancellation.
    pub fn cause(&self) -> Option<&ApiError> {
        match self {
            ClassifiedError::Retryable(cause) | ClassifiedError::NonRetryable(cause) => Some(cause),
            ClassifiedError::Cancelled => None,
        }
    }
}

/// The caller aborted the operation. Carries no provider attribution.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("operation cancelled")]
pub struct Cancelled;

/// A non-retryable failure attributed to one resource kind.
#[derive(Error, Debug)]
#[error("failed to list {}: {}", .kind.plural(), .cause)]
pub struct ProviderFailure {
    pub kind: ResourceKind,
    #[source]
    pub cause: ApiError,
}

/// Render an error together with every distinct message in its source chain.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();

    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }

    message
}

pub type Result<T> = std::result::Result<T, ApiError>;
