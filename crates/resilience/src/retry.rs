//! Bounded retry with backoff and jitter.
//!
//! The policy only computes decisions and delays. The caller owns the
//! loop, because the breaker has to be consulted before every attempt.

use std::time::Duration;

use rand::Rng;

use crate::config::{Backoff, RetryConfig};
use crate::error::CallError;

/// Retry decisions for one dependency.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self::new(RetryConfig {
            max_attempts: 1,
            ..Default::default()
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// Returns true if another attempt may follow failed attempt number `attempt` (1-based).
    pub fn should_retry(&self, attempt: u32, error: &CallError) -> bool {
        error.is_transient() && attempt < self.config.max_attempts
    }

    /// Delay before the attempt following failed attempt number `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.config.jitter <= 0.0 || base.is_zero() {
            return base;
        }
        let spread = rand::thread_rng().gen_range(-self.config.jitter..=self.config.jitter);
        base.mul_f64((1.0 + spread).max(0.0))
    }

    /// Delay without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        match &self.config.backoff {
            Backoff::Fixed { delay } => *delay,
            Backoff::Exponential {
                base,
                multiplier,
                max,
            } => {
                let exponent = attempt.saturating_sub(1) as i32;
                let scaled = base.as_nanos() as f64 * multiplier.powi(exponent);
                if scaled.is_finite() && scaled < max.as_nanos() as f64 {
                    Duration::from_nanos(scaled as u64)
                } else {
                    *max
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
