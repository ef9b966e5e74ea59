//! Per-channel retry engine.
//!
//! A [`RetryPolicy`] drives the attempt loop for a single channel: attempts are
//! strictly sequential, only error kinds listed as retryable are retried, and
//! the backoff sleep happens on the calling task.

use crate::core::{ErrorKind, SendError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Fraction of the computed delay used as the jitter range.
const JITTER_FRACTION: f64 = 0.1;

/// How the delay grows from one attempt to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    Fixed,
    Linear,
    #[default]
    Exponential,
}

/// Retry settings as they appear in the configuration file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total number of attempts per channel, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry, in seconds
    pub base_delay_seconds: f64,
    /// Upper bound for any single delay, in seconds
    pub max_delay_seconds: f64,
    pub strategy: BackoffStrategy,
    /// Growth factor for the exponential strategy
    pub multiplier: f64,
    /// Randomize each delay by up to ±10%
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay_seconds: 1.0,
            max_delay_seconds: 10.0,
            strategy: BackoffStrategy::Exponential,
            multiplier: 2.0,
            jitter: true,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RetryConfigError {
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("{field} must be a finite, non-negative number (got {value})")]
    InvalidDelay { field: &'static str, value: f64 },

    #[error("max_delay_seconds ({max}) must not be smaller than base_delay_seconds ({base})")]
    MaxBelowBase { base: f64, max: f64 },

    #[error("multiplier must be a finite, non-negative number (got {0})")]
    InvalidMultiplier(f64),

    #[error("{field} is too large to be used as a delay (got {value})")]
    DelayTooLarge { field: &'static str, value: f64 },
}

impl RetryConfig {
    /// Builds the runtime policy, checking the invariants the engine relies on.
    pub fn to_policy(&self) -> Result<RetryPolicy, RetryConfigError> {
        if self.max_attempts == 0 {
            return Err(RetryConfigError::ZeroAttempts);
        }
        for (field, value) in [
            ("base_delay_seconds", self.base_delay_seconds),
            ("max_delay_seconds", self.max_delay_seconds),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(RetryConfigError::InvalidDelay { field, value });
            }
        }
        if self.max_delay_seconds < self.base_delay_seconds {
            return Err(RetryConfigError::MaxBelowBase {
                base: self.base_delay_seconds,
                max: self.max_delay_seconds,
            });
        }
        if !self.multiplier.is_finite() || self.multiplier < 0.0 {
            return Err(RetryConfigError::InvalidMultiplier(self.multiplier));
        }

        let delay = |field: &'static str, value: f64| {
            Duration::try_from_secs_f64(value)
                .map_err(|_| RetryConfigError::DelayTooLarge { field, value })
        };

        Ok(RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: delay("base_delay_seconds", self.base_delay_seconds)?,
            max_delay: delay("max_delay_seconds", self.max_delay_seconds)?,
            strategy: self.strategy,
            backoff_multiplier: self.multiplier,
            jitter: self.jitter,
            retryable_error_kinds: RetryPolicy::default_retryable_kinds(),
        })
    }
}

/// The validated, immutable retry policy used for one dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub strategy: BackoffStrategy,
    pub backoff_multiplier: f64,
    pub jitter: bool,
    pub retryable_error_kinds: HashSet<ErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        // The default config always passes validation.
        match RetryConfig::default().to_policy() {
            Ok(policy) => policy,
            Err(_) => unreachable!("default retry config is valid"),
        }
    }
}

impl RetryPolicy {
    pub fn default_retryable_kinds() -> HashSet<ErrorKind> {
        [ErrorKind::Network, ErrorKind::Temporary, ErrorKind::Timeout]
            .into_iter()
            .collect()
    }

    /// Checks a policy built by hand rather than through [`RetryConfig`].
    pub fn validate(&self) -> Result<(), RetryConfigError> {
        if self.max_attempts == 0 {
            return Err(RetryConfigError::ZeroAttempts);
        }
        if self.max_delay < self.base_delay {
            return Err(RetryConfigError::MaxBelowBase {
                base: self.base_delay.as_secs_f64(),
                max: self.max_delay.as_secs_f64(),
            });
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 0.0 {
            return Err(RetryConfigError::InvalidMultiplier(self.backoff_multiplier));
        }
        Ok(())
    }

    pub fn is_retryable(&self, kind: ErrorKind) -> bool {
        self.retryable_error_kinds.contains(&kind)
    }

    /// The delay after `attempt` (1-based) has failed, before jitter.
    ///
    /// Always clamped to `max_delay`.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_secs_f64();
        let max = self.max_delay.as_secs_f64();
        let attempt = attempt.max(1);

        let raw = match self.strategy {
            BackoffStrategy::Fixed => base,
            BackoffStrategy::Linear => base * f64::from(attempt),
            BackoffStrategy::Exponential => {
                let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
                base * self.backoff_multiplier.powi(exponent)
            }
        };

        // 0 * inf is the only way to get NaN here; a zero base means no delay.
        let clamped = if raw.is_nan() { 0.0 } else { raw.min(max) };
        Duration::try_from_secs_f64(clamped.max(0.0))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// The delay to actually sleep after `attempt` has failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.base_delay_for(attempt);
        if !self.jitter {
            return delay;
        }
        apply_jitter(delay, &mut rand::rng())
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or `max_attempts` is exhausted. Returns the last error in the latter cases.
    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        label: &str,
        mut operation: F,
    ) -> Result<T, SendError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SendError>>,
    {
        let mut attempt: u32 = 1;
        loop {
            debug!(channel = label, attempt, "Starting attempt");
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(channel = label, attempt, "Succeeded after retrying");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    if !self.is_retryable(e.kind) {
                        error!(channel = label, attempt, error = %e, "Non-retryable failure");
                        return Err(e);
                    }
                    if attempt >= self.max_attempts {
                        error!(channel = label, attempt, error = %e, "Giving up after final attempt");
                        return Err(e);
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        channel = label,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, retrying after backoff"
                    );
                    metrics::counter!("notification_retries_total", "channel" => label.to_string())
                        .increment(1);
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Perturbs `delay` by a uniform value in ±10% of itself, floored at zero.
fn apply_jitter<R: Rng>(delay: Duration, rng: &mut R) -> Duration {
    let secs = delay.as_secs_f64();
    let range = secs * JITTER_FRACTION;
    if range <= 0.0 {
        return delay;
    }
    let perturbed = secs + rng.random_range(-range..=range);
    Duration::try_from_secs_f64(perturbed.max(0.0)).unwrap_or(Duration::MAX)
}
