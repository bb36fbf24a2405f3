//! Resilience primitives for calls to remote dependencies.
//!
//! This crate provides:
//! - [`CircuitBreaker`] with a count-based sliding window and bounded half-open trials
//! - [`RetryPolicy`] with fixed or exponential backoff and jitter
//! - [`CallError`] classifying a single attempt as transient or business failure
//! - [`Clock`] so breaker timing can be driven manually in tests

pub mod circuit_breaker;
pub mod clock;
pub mod config;
pub mod error;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitOpen, CircuitState, HealthSnapshot, Permit};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Backoff, CircuitBreakerConfig, ResilienceConfig, RetryConfig};
pub use error::{CallError, ConfigError};
pub use retry::RetryPolicy;
