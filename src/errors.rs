use sagewatch_api::{ApiError, Cancelled, ClassifiedError, ProviderFailure};
use sagewatch_core::CoreError;
use thiserror::Error;

/// Application-level errors for the CLI
#[derive(Error, Debug)]
pub enum SageWatchError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Core domain error: {0}")]
    Core(#[from] CoreError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Provider(#[from] ProviderFailure),

    #[error("Credentials rejected: {0}")]
    Unauthorized(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl SageWatchError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            SageWatchError::Cancelled => 130,
            _ => 1,
        }
    }
}

impl From<Cancelled> for SageWatchError {
    fn from(_: Cancelled) -> Self {
        SageWatchError::Cancelled
    }
}

impl From<ClassifiedError> for SageWatchError {
    fn from(err: ClassifiedError) -> Self {
        match err {
            ClassifiedError::Retryable(cause) | ClassifiedError::NonRetryable(cause) => {
                SageWatchError::Api(cause)
            }
            ClassifiedError::Cancelled => SageWatchError::Cancelled,
        }
    }
}

/// Configuration-specific errors that can occur while loading settings
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("TOML parsing error: {0}")]
    TomlError(String),
}

pub type Result<T> = std::result::Result<T, SageWatchError>;
