//! Configuration for invoker chains.

use crate::errors::{InvokeResult, InvokerError};
use crate::resilience::{ResilienceConfig, RetryConfig};
use crate::{
    DEFAULT_ATTEMPT_TIMEOUT_SECS, DEFAULT_BASE_DELAY_MS, DEFAULT_CACHE_TTL_SECS,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY_MS,
};
use std::time::Duration;

/// Environment variable overriding the retry budget
pub const ENV_MAX_ATTEMPTS: &str = "INVOKER_MAX_ATTEMPTS";
/// Environment variable overriding the first backoff delay, in milliseconds
pub const ENV_BASE_DELAY_MS: &str = "INVOKER_BASE_DELAY_MS";
/// Environment variable overriding the backoff cap, in milliseconds
pub const ENV_MAX_DELAY_MS: &str = "INVOKER_MAX_DELAY_MS";
/// Environment variable overriding the per-attempt deadline, in milliseconds
pub const ENV_ATTEMPT_TIMEOUT_MS: &str = "INVOKER_ATTEMPT_TIMEOUT_MS";
/// Environment variable overriding the cache entry lifetime, in seconds
pub const ENV_CACHE_TTL_SECS: &str = "INVOKER_CACHE_TTL_SECS";

/// Configuration shared by the decorators of a chain.
#[derive(Debug, Clone, PartialEq)]
pub struct InvokerConfig {
    /// Retry and timeout policy used by `add_resilience`
    pub resilience: ResilienceConfig,
    /// Lifetime of cached results
    pub cache_ttl: Duration,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            resilience: ResilienceConfig::default(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        }
    }
}

impl InvokerConfig {
    /// Creates a new configuration builder
    pub fn builder() -> InvokerConfigBuilder {
        InvokerConfigBuilder::default()
    }

    /// Creates a configuration from `INVOKER_*` environment variables.
    ///
    /// Unset or unparsable variables fall back to the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`InvokerError::Configuration`] if the resulting values are
    /// invalid, e.g. `INVOKER_MAX_ATTEMPTS=0`.
    pub fn from_env() -> InvokeResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> InvokeResult<Self> {
        let parse = |name: &str| lookup(name).and_then(|s| s.trim().parse::<u64>().ok());

        let mut builder = Self::builder();
        if let Some(attempts) = parse(ENV_MAX_ATTEMPTS) {
            builder = builder.max_attempts(u32::try_from(attempts).unwrap_or(u32::MAX));
        }
        if let Some(ms) = parse(ENV_BASE_DELAY_MS) {
            builder = builder.base_delay(Duration::from_millis(ms));
        }
        if let Some(ms) = parse(ENV_MAX_DELAY_MS) {
            builder = builder.max_delay(Duration::from_millis(ms));
        }
        if let Some(ms) = parse(ENV_ATTEMPT_TIMEOUT_MS) {
            builder = builder.attempt_timeout(Duration::from_millis(ms));
        }
        if let Some(secs) = parse(ENV_CACHE_TTL_SECS) {
            builder = builder.cache_ttl(Duration::from_secs(secs));
        }
        builder.build()
    }
}

/// Builder for [`InvokerConfig`]
#[derive(Debug, Default)]
pub struct InvokerConfigBuilder {
    max_attempts: Option<u32>,
    base_delay: Option<Duration>,
    max_delay: Option<Duration>,
    backoff_multiplier: Option<f64>,
    jitter: Option<f64>,
    attempt_timeout: Option<Duration>,
    cache_ttl: Option<Duration>,
}

impl InvokerConfigBuilder {
    /// Sets the total number of attempts, including the first one
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Sets the delay before the first retry
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = Some(delay);
        self
    }

    /// Sets the upper bound for any single delay
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Sets the growth factor between consecutive delays
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = Some(multiplier);
        self
    }

    /// Sets the jitter fraction applied to each delay
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = Some(jitter);
        self
    }

    /// Sets the per-attempt deadline
    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Sets the lifetime of cached results
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Builds the configuration
    pub fn build(self) -> InvokeResult<InvokerConfig> {
        let max_attempts = self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS);
        if max_attempts == 0 {
            return Err(InvokerError::Configuration {
                message: "max_attempts must be at least 1".to_string(),
            });
        }

        let attempt_timeout = self
            .attempt_timeout
            .unwrap_or(Duration::from_secs(DEFAULT_ATTEMPT_TIMEOUT_SECS));
        if attempt_timeout.is_zero() {
            return Err(InvokerError::Configuration {
                message: "attempt_timeout must be greater than zero".to_string(),
            });
        }

        let backoff_multiplier = self.backoff_multiplier.unwrap_or(2.0);
        if backoff_multiplier.is_nan() || backoff_multiplier < 1.0 {
            return Err(InvokerError::Configuration {
                message: format!(
                    "backoff_multiplier must be at least 1.0, got {}",
                    backoff_multiplier
                ),
            });
        }

        let jitter = self.jitter.unwrap_or(0.0);
        if !(0.0..=1.0).contains(&jitter) {
            return Err(InvokerError::Configuration {
                message: format!("jitter must be within 0.0..=1.0, got {}", jitter),
            });
        }

        let initial_backoff = self
            .base_delay
            .unwrap_or(Duration::from_millis(DEFAULT_BASE_DELAY_MS));
        let max_backoff = self
            .max_delay
            .unwrap_or(Duration::from_millis(DEFAULT_MAX_DELAY_MS))
            .max(initial_backoff);

        Ok(InvokerConfig {
            resilience: ResilienceConfig {
                retry: RetryConfig {
                    max_attempts,
                    initial_backoff,
                    max_backoff,
                    backoff_multiplier,
                    jitter,
                },
                attempt_timeout,
                ..ResilienceConfig::default()
            },
            cache_ttl: self
                .cache_ttl
                .unwrap_or(Duration::from_secs(DEFAULT_CACHE_TTL_SECS)),
        })
    }
}
