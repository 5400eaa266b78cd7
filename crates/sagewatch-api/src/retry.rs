use crate::classify::classify;
use crate::errors::{error_chain, ApiError, ClassifiedError, Result};
use log::{debug, warn};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Bounded exponential backoff with symmetric jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first try; total tries are `max_attempts + 1`.
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
    /// Fraction of the interval randomised in both directions (0..=1).
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<()> {
        if !self.multiplier.is_finite() || self.multiplier <= 1.0 {
            return Err(ApiError::Config(format!(
                "retry multiplier must be greater than 1, got {}",
                self.multiplier
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ApiError::Config(format!(
                "retry jitter factor must be between 0 and 1, got {}",
                self.jitter_factor
            )));
        }
        if self.initial_interval > self.max_interval {
            return Err(ApiError::Config(format!(
                "initial retry interval {:?} exceeds maximum {:?}",
                self.initial_interval, self.max_interval
            )));
        }
        Ok(())
    }

    /// Un-jittered wait before retry `retry_index` (0 for the first retry).
    pub fn backoff_interval(&self, retry_index: u32) -> Duration {
        let max_secs = self.max_interval.as_secs_f64();
        let exponent = i32::try_from(retry_index).unwrap_or(i32::MAX);
        let secs = self.initial_interval.as_secs_f64() * self.multiplier.powi(exponent);
        // powi overflows to infinity long before the cap matters
        Duration::from_secs_f64(secs.min(max_secs).max(0.0))
    }

    /// Jittered wait for `retry_index` given a uniform sample `unit` in [0, 1).
    /// Never exceeds `max_interval`.
    pub fn jittered_interval(&self, retry_index: u32, unit: f64) -> Duration {
        let base = self.backoff_interval(retry_index).as_secs_f64();
        let factor = 1.0 + self.jitter_factor * (2.0 * unit.clamp(0.0, 1.0) - 1.0);
        let secs = (base * factor).min(self.max_interval.as_secs_f64()).max(0.0);
        Duration::from_secs_f64(secs)
    }

    fn next_delay(&self, retry_index: u32) -> Duration {
        self.jittered_interval(retry_index, rand::random::<f64>())
    }
}

/// Runs a fallible async operation under a [`RetryPolicy`].
///
/// Failures are classified after every attempt: non-retryable failures end
/// the loop at once, retryable ones are retried until the budget runs out.
/// Cancellation is observed before each attempt, during the attempt and
/// during the backoff wait, and always takes precedence.
#[derive(Debug, Clone, Default)]
pub struct Retrier {
    policy: RetryPolicy,
}

impl Retrier {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn execute<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> std::result::Result<T, ClassifiedError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let total_attempts = self.policy.max_attempts.saturating_add(1);
        let mut retry_index: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                debug!("Cancelled before attempt {}", retry_index + 1);
                return Err(ClassifiedError::Cancelled);
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ClassifiedError::Cancelled),
                outcome = operation() => outcome,
            };

            let failure = match outcome {
                Ok(value) => return Ok(value),
                Err(err) => classify(err),
            };

            match failure {
                ClassifiedError::Retryable(ref cause) if retry_index < self.policy.max_attempts => {
                    let delay = self.policy.next_delay(retry_index);
                    warn!(
                        "Attempt {}/{} failed with retryable error ({}), retrying in {:?}",
                        retry_index + 1,
                        total_attempts,
                        error_chain(cause),
                        delay
                    );

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            debug!("Cancelled during backoff after attempt {}", retry_index + 1);
                            return Err(ClassifiedError::Cancelled);
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }

                    retry_index += 1;
                }
                ClassifiedError::Retryable(cause) => {
                    debug!("Retry budget of {} attempts exhausted", total_attempts);
                    return Err(ClassifiedError::Retryable(cause));
                }
                other => return Err(other),
            }
        }
    }
}
