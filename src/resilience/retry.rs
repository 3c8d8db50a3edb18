use crate::errors::InvokerError;
use crate::{
    DEFAULT_ATTEMPT_TIMEOUT_SECS, DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY_MS,
    DEFAULT_TEARDOWN_GRACE_SECS,
};
use async_trait::async_trait;
use std::time::Duration;

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Upper bound for any single delay
    pub max_backoff: Duration,
    /// Growth factor between consecutive delays
    pub backoff_multiplier: f64,
    /// Fraction of the delay randomly added or removed
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_backoff: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            backoff_multiplier: 2.0,
            jitter: 0.0,
        }
    }
}

impl RetryConfig {
    /// Calculate the delay after the given failed attempt (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base_delay =
            self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(exponent);

        let jitter = if self.jitter > 0.0 {
            let jitter_range = base_delay * self.jitter;
            rand::random::<f64>() * jitter_range * 2.0 - jitter_range
        } else {
            0.0
        };
        let delay_ms = (base_delay + jitter)
            .min(self.max_backoff.as_millis() as f64)
            .max(0.0);

        Duration::from_millis(delay_ms as u64)
    }
}

/// Configuration for the resilience decorator
#[derive(Debug, Clone, PartialEq)]
pub struct ResilienceConfig {
    /// Retry budget and backoff shape
    pub retry: RetryConfig,
    /// Deadline for a single attempt
    pub attempt_timeout: Duration,
    /// How long a timed-out attempt may spend tearing its client down before
    /// it is dropped and the client aborted
    pub teardown_grace: Duration,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            attempt_timeout: Duration::from_secs(DEFAULT_ATTEMPT_TIMEOUT_SECS),
            teardown_grace: Duration::from_secs(DEFAULT_TEARDOWN_GRACE_SECS),
        }
    }
}

impl ResilienceConfig {
    /// A configuration that makes exactly one attempt with the default timeout
    pub fn single_attempt() -> Self {
        Self {
            retry: RetryConfig {
                max_attempts: 1,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// Hook for custom retry behavior
#[async_trait]
pub trait RetryHook: Send + Sync {
    /// Called after a retryable failure, before the backoff delay
    async fn on_retry(&self, context: RetryContext) -> RetryDecision;
}

/// Context information for a retry attempt
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// The attempt that just failed (1-based)
    pub attempt: u32,
    /// The failure
    pub error: InvokerError,
    /// The delay that will be applied
    pub delay: Duration,
    /// Client type being invoked
    pub client: &'static str,
}

/// Decision on how to proceed with a retry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Use the default retry behavior
    Default,
    /// Retry with a custom delay
    Retry(Duration),
    /// Stop and return the current error
    Abort,
}
