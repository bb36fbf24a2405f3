//! Breaker and retry settings for one guarded dependency.
//!
//! Durations are (de)serialized as integer milliseconds, so a JSON
//! override looks like `{"circuit_breaker": {"open_duration_ms": 5000}}`.
//! Missing fields fall back to the defaults below.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Circuit breaker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Number of most recent call outcomes kept in the sliding window.
    pub sliding_window_size: usize,
    /// Outcomes required in the window before the failure rate is evaluated.
    pub minimum_calls: usize,
    /// Failure percentage (0-100] at or above which the breaker opens.
    pub failure_rate_threshold: f64,
    /// Time spent OPEN before trial calls are admitted.
    #[serde(rename = "open_duration_ms", with = "millis")]
    pub open_duration: Duration,
    /// Trial calls admitted while HALF_OPEN; all must succeed to close.
    pub half_open_trials: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            sliding_window_size: 10,
            minimum_calls: 5,
            failure_rate_threshold: 50.0,
            open_duration: Duration::from_secs(10),
            half_open_trials: 3,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sliding_window_size == 0 {
            return Err(ConfigError::Zero {
                field: "sliding_window_size",
            });
        }
        if self.minimum_calls == 0 {
            return Err(ConfigError::Zero {
                field: "minimum_calls",
            });
        }
        if self.half_open_trials == 0 {
            return Err(ConfigError::Zero {
                field: "half_open_trials",
            });
        }
        if !(self.failure_rate_threshold > 0.0 && self.failure_rate_threshold <= 100.0) {
            return Err(ConfigError::FailureRate(self.failure_rate_threshold));
        }
        Ok(())
    }
}

/// Delay schedule between attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed {
        #[serde(rename = "delay_ms", with = "millis")]
        delay: Duration,
    },
    /// `base * multiplier^(retry - 1)`, capped at `max`.
    Exponential {
        #[serde(rename = "base_ms", with = "millis")]
        base: Duration,
        multiplier: f64,
        #[serde(rename = "max_ms", with = "millis")]
        max: Duration,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Exponential {
            base: Duration::from_millis(200),
            multiplier: 2.0,
            max: Duration::from_secs(2),
        }
    }
}

/// Retry settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub backoff: Backoff,
    /// Random spread applied to each delay, as a fraction of it (0.0-1.0).
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::default(),
            jitter: 0.2,
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Zero {
                field: "max_attempts",
            });
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ConfigError::Jitter(self.jitter));
        }
        if let Backoff::Exponential { multiplier, .. } = self.backoff
            && multiplier < 1.0
        {
            return Err(ConfigError::Multiplier(multiplier));
        }
        Ok(())
    }
}

/// Everything needed to guard calls to one dependency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub circuit_breaker: CircuitBreakerConfig,
    pub retry: RetryConfig,
    /// Hard limit on a single attempt.
    #[serde(rename = "call_timeout_ms", with = "millis")]
    pub call_timeout: Duration,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            circuit_breaker: CircuitBreakerConfig::default(),
            retry: RetryConfig::default(),
            call_timeout: Duration::from_secs(3),
        }
    }
}

impl ResilienceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.circuit_breaker.validate()?;
        self.retry.validate()
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ResilienceConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: ResilienceConfig = serde_json::from_str(
            r#"{
                "circuit_breaker": {"failure_rate_threshold": 25.0, "open_duration_ms": 1500},
                "retry": {"max_attempts": 5, "backoff": {"kind": "fixed", "delay_ms": 50}}
            }"#,
        )
        .unwrap();

        assert_eq!(config.circuit_breaker.failure_rate_threshold, 25.0);
        assert_eq!(
            config.circuit_breaker.open_duration,
            Duration::from_millis(1500)
        );
        assert_eq!(config.circuit_breaker.sliding_window_size, 10);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(
            config.retry.backoff,
            Backoff::Fixed {
                delay: Duration::from_millis(50)
            }
        );
        assert_eq!(config.call_timeout, Duration::from_secs(3));
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut breaker = CircuitBreakerConfig {
            failure_rate_threshold: 0.0,
            ..Default::default()
        };
        assert_eq!(breaker.validate(), Err(ConfigError::FailureRate(0.0)));

        breaker.failure_rate_threshold = 50.0;
        breaker.half_open_trials = 0;
        assert_eq!(
            breaker.validate(),
            Err(ConfigError::Zero {
                field: "half_open_trials"
            })
        );

        let retry = RetryConfig {
            jitter: 1.5,
            ..Default::default()
        };
        assert_eq!(retry.validate(), Err(ConfigError::Jitter(1.5)));
    }
}
