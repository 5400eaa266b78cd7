//! Failure taxonomy for provider calls.
//!
//! Unknown failures are non-retryable: an error whose semantics we cannot
//! name fails fast instead of being silently retried.

use crate::errors::{error_chain, ApiError, ClassifiedError};

/// Platform codes for transient conditions.
pub const RETRYABLE_CODES: &[&str] = &[
    "RequestTimeout",
    "ThrottlingException",
    "ProvisionedThroughputExceededException",
    "TransactionInProgressException",
];

/// Platform codes for failures that retrying cannot fix.
pub const NON_RETRYABLE_CODES: &[&str] = &[
    "ValidationError",
    "ValidationException",
    "AccessDeniedException",
    "InvalidParameterException",
];

/// Lower-case message fragments that identify transport failures.
pub const NETWORK_FAILURE_PATTERNS: &[&str] = &[
    "connection refused",
    "connection reset",
    "network is unreachable",
    "timeout",
    "i/o timeout",
];

/// Whether a message looks like a transient network failure.
pub fn is_network_failure_message(message: &str) -> bool {
    let message = message.to_lowercase();
    NETWORK_FAILURE_PATTERNS
        .iter()
        .any(|pattern| message.contains(pattern))
}

fn code_is_retryable(code: &str) -> Option<bool> {
    if RETRYABLE_CODES.contains(&code) {
        Some(true)
    } else if NON_RETRYABLE_CODES.contains(&code) {
        Some(false)
    } else {
        None
    }
}

/// Tag a provider failure as retryable or not.
///
/// A recognised platform code decides first; otherwise the whole error chain
/// is matched against the network-failure heuristic.
pub fn classify(error: ApiError) -> ClassifiedError {
    let verdict = error
        .code()
        .and_then(code_is_retryable)
        .unwrap_or_else(|| is_network_failure_message(&error_chain(&error)));

    if verdict {
        ClassifiedError::Retryable(error)
    } else {
        ClassifiedError::NonRetryable(error)
    }
}
