//! Retry policies and the retry controller.
//!
//! The controller only decides. It never sleeps: a `Retry` decision is a
//! scheduling hint the engine acts on when it re-dispatches the attempt.

use crate::core::StationRun;
use crate::errors::{ConfigurationError, ErrorInfo, ProcessingError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Jitter strategy to prevent thundering-herd retries across sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter
    #[default]
    None,
    /// Random from 0 to delay
    Full,
    /// Half fixed, half random
    Equal,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

/// Per-station retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds.
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    /// Delay cap in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Jitter applied after capping.
    #[serde(default)]
    pub jitter: JitterStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter: JitterStrategy::None,
        }
    }
}

impl RetryPolicy {
    /// Creates the default policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::default().with_max_attempts(1)
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the base backoff.
    #[must_use]
    pub fn with_base_backoff_ms(mut self, delay: u64) -> Self {
        self.base_backoff_ms = delay;
        self
    }

    /// Sets the backoff cap.
    #[must_use]
    pub fn with_max_backoff_ms(mut self, delay: u64) -> Self {
        self.max_backoff_ms = delay;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Validates the policy for the named station.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_attempts` is zero or the base exceeds the cap.
    pub fn validate(&self, station: &str) -> Result<(), ConfigurationError> {
        let problem = if self.max_attempts == 0 {
            Some("max_attempts must be at least 1".to_string())
        } else if self.base_backoff_ms > self.max_backoff_ms {
            Some(format!(
                "base_backoff_ms ({}) exceeds max_backoff_ms ({})",
                self.base_backoff_ms, self.max_backoff_ms
            ))
        } else {
            None
        };

        match problem {
            Some(problem) => Err(ConfigurationError::new(format!(
                "Station '{station}' has an invalid retry policy: {problem}"
            ))
            .with_stations(vec![station.to_string()])
            .with_error_info(ErrorInfo::new("CONFIG-INVALID-RETRY", problem))),
            None => Ok(()),
        }
    }

    /// Un-jittered delay after the given number of failed attempts.
    ///
    /// `base * 2^(failed_attempts - 1)`, capped at `max_backoff_ms`.
    #[must_use]
    pub fn backoff_ms(&self, failed_attempts: u32) -> u64 {
        let exponent = failed_attempts.saturating_sub(1);
        let factor = 2u64.checked_pow(exponent).unwrap_or(u64::MAX);
        self.base_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms)
    }
}

/// Outcome of a retry decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-dispatch after the delay.
    Retry(Duration),
    /// Retries exhausted.
    Terminal,
}

/// Decides whether a failed attempt is retried.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryController;

impl RetryController {
    /// Creates a new retry controller.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Records a failure on the run and decides what happens next.
    ///
    /// `run.attempts` already counts the failed attempt.
    pub fn on_failure(
        &self,
        run: &mut StationRun,
        policy: &RetryPolicy,
        error: &ProcessingError,
    ) -> RetryDecision {
        run.last_error = Some(error.clone());

        if run.attempts >= policy.max_attempts {
            return RetryDecision::Terminal;
        }

        let delay = policy.backoff_ms(run.attempts);
        RetryDecision::Retry(Duration::from_millis(apply_jitter(delay, policy.jitter)))
    }
}

fn apply_jitter(delay: u64, jitter: JitterStrategy) -> u64 {
    match jitter {
        JitterStrategy::None => delay,
        JitterStrategy::Full => {
            if delay == 0 {
                0
            } else {
                rand::thread_rng().gen_range(0..=delay)
            }
        }
        JitterStrategy::Equal => {
            let half = delay / 2;
            if half == 0 {
                delay
            } else {
                (delay - half) + rand::thread_rng().gen_range(0..=half)
            }
        }
    }
}
