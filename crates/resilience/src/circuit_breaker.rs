//! Per-dependency circuit breaker.
//!
//! State transitions:
//! ```text
//!            failure rate >= threshold
//! CLOSED ───────────────────────────────► OPEN
//!   ▲                                      │ open_duration elapsed
//!   │ all trials succeed                   ▼
//!   └──────────────────────────────── HALF_OPEN
//!                                          │ any trial fails
//!                                          └──────────► OPEN
//! ```
//!
//! All state sits behind one mutex, so every acquire and record is
//! linearizable. Each transition bumps a generation counter; outcomes
//! reported by permits issued in an earlier generation are ignored.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

use crate::clock::{Clock, SystemClock};
use crate::config::CircuitBreakerConfig;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Calls pass through and outcomes are recorded.
    Closed,
    /// Calls are rejected without touching the dependency.
    Open,
    /// A bounded number of trial calls probe the dependency.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }

    fn gauge_value(&self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::Open => 1.0,
            CircuitState::HalfOpen => 2.0,
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Returned when the breaker refuses a call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("circuit breaker '{dependency}' is {state}")]
pub struct CircuitOpen {
    pub dependency: String,
    pub state: CircuitState,
}

/// Read-only view of a breaker, used by the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub dependency: String,
    pub state: CircuitState,
    /// Failure percentage over the current window.
    pub failure_rate: f64,
    pub buffered_calls: usize,
    pub failed_calls: usize,
}

#[derive(Debug)]
struct Window {
    size: usize,
    outcomes: VecDeque<bool>,
    failures: usize,
}

impl Window {
    fn new(size: usize) -> Self {
        Self {
            size,
            outcomes: VecDeque::with_capacity(size),
            failures: 0,
        }
    }

    fn push(&mut self, success: bool) {
        if self.outcomes.len() >= self.size
            && let Some(oldest) = self.outcomes.pop_front()
            && !oldest
        {
            self.failures -= 1;
        }
        self.outcomes.push_back(success);
        if !success {
            self.failures += 1;
        }
    }

    fn len(&self) -> usize {
        self.outcomes.len()
    }

    fn failure_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            0.0
        } else {
            self.failures as f64 * 100.0 / self.outcomes.len() as f64
        }
    }

    fn clear(&mut self) {
        self.outcomes.clear();
        self.failures = 0;
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    generation: u64,
    window: Window,
    opened_at: Option<Instant>,
    trials_admitted: usize,
    trial_successes: usize,
}

/// A circuit breaker guarding a single dependency.
///
/// Created once per dependency and shared through an `Arc` by every
/// client that talks to it.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Creates a closed breaker using the system clock.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }

    /// Creates a closed breaker reading time from `clock`.
    pub fn with_clock(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let window = Window::new(config.sliding_window_size);
        let breaker = Self {
            name: name.into(),
            config,
            clock,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                generation: 0,
                window,
                opened_at: None,
                trials_admitted: 0,
                trial_successes: 0,
            }),
        };
        breaker.export_state(CircuitState::Closed);
        breaker
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state, promoting OPEN to HALF_OPEN if the cool-down is over.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        self.promote_if_cooled_down(&mut inner);
        inner.state
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let mut inner = self.inner.lock();
        self.promote_if_cooled_down(&mut inner);
        HealthSnapshot {
            dependency: self.name.clone(),
            state: inner.state,
            failure_rate: inner.window.failure_rate(),
            buffered_calls: inner.window.len(),
            failed_calls: inner.window.failures,
        }
    }

    /// Asks permission to make one call.
    ///
    /// The returned permit must be resolved with [`Permit::record_success`]
    /// or [`Permit::record_failure`]. A permit dropped unresolved gives its
    /// trial slot back without counting as an outcome.
    pub fn try_acquire(&self) -> Result<Permit<'_>, CircuitOpen> {
        let mut inner = self.inner.lock();
        self.promote_if_cooled_down(&mut inner);

        let state = inner.state;
        match state {
            CircuitState::Closed => Ok(Permit::new(self, inner.generation, false)),
            CircuitState::HalfOpen if inner.trials_admitted < self.config.half_open_trials => {
                inner.trials_admitted += 1;
                Ok(Permit::new(self, inner.generation, true))
            }
            state => {
                metrics::counter!("circuit_breaker_rejected_total", "dependency" => self.name.clone())
                    .increment(1);
                Err(CircuitOpen {
                    dependency: self.name.clone(),
                    state,
                })
            }
        }
    }

    /// Forces the breaker back to CLOSED with an empty window.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.window.clear();
        self.transition(&mut inner, CircuitState::Closed);
    }

    fn on_outcome(&self, generation: u64, trial: bool, success: bool) {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return;
        }

        let state = inner.state;
        match state {
            CircuitState::Closed => {
                inner.window.push(success);
                if inner.window.len() >= self.config.minimum_calls
                    && inner.window.failure_rate() >= self.config.failure_rate_threshold
                {
                    tracing::warn!(
                        dependency = %self.name,
                        failure_rate = inner.window.failure_rate(),
                        calls = inner.window.len(),
                        "failure rate over threshold"
                    );
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen if trial => {
                if success {
                    inner.trial_successes += 1;
                    if inner.trial_successes >= self.config.half_open_trials {
                        inner.window.clear();
                        self.transition(&mut inner, CircuitState::Closed);
                    }
                } else {
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            _ => {}
        }
    }

    fn on_abandoned(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.generation == generation && inner.state == CircuitState::HalfOpen {
            inner.trials_admitted = inner.trials_admitted.saturating_sub(1);
        }
    }

    fn promote_if_cooled_down(&self, inner: &mut Inner) {
        if inner.state == CircuitState::Open
            && let Some(opened_at) = inner.opened_at
            && self.clock.now().saturating_duration_since(opened_at) >= self.config.open_duration
        {
            self.transition(inner, CircuitState::HalfOpen);
        }
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        inner.generation += 1;
        inner.trials_admitted = 0;
        inner.trial_successes = 0;
        inner.opened_at = match to {
            CircuitState::Open => Some(self.clock.now()),
            _ => None,
        };

        if from != to {
            match to {
                CircuitState::Open => tracing::warn!(
                    dependency = %self.name,
                    %from,
                    %to,
                    "circuit breaker opened"
                ),
                _ => tracing::info!(
                    dependency = %self.name,
                    %from,
                    %to,
                    "circuit breaker state changed"
                ),
            }
            metrics::counter!(
                "circuit_breaker_transitions_total",
                "dependency" => self.name.clone(),
                "to" => to.as_str()
            )
            .increment(1);
        }
        self.export_state(to);
    }

    fn export_state(&self, state: CircuitState) {
        metrics::gauge!("circuit_breaker_state", "dependency" => self.name.clone())
            .set(state.gauge_value());
    }

    /// Time left before an OPEN breaker admits trial calls.
    pub fn remaining_open_time(&self) -> Option<Duration> {
        let inner = self.inner.lock();
        match (inner.state, inner.opened_at) {
            (CircuitState::Open, Some(opened_at)) => Some(
                self.config
                    .open_duration
                    .saturating_sub(self.clock.now().saturating_duration_since(opened_at)),
            ),
            _ => None,
        }
    }
}

/// Permission to make one call through a breaker.
#[derive(Debug)]
#[must_use = "a permit must record the call outcome"]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    trial: bool,
    resolved: bool,
}

impl<'a> Permit<'a> {
    fn new(breaker: &'a CircuitBreaker, generation: u64, trial: bool) -> Self {
        Self {
            breaker,
            generation,
            trial,
            resolved: false,
        }
    }

    /// Returns true if this permit is a HALF_OPEN trial.
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn record_success(mut self) {
        self.resolved = true;
        self.breaker.on_outcome(self.generation, self.trial, true);
    }

    pub fn record_failure(mut self) {
        self.resolved = true;
        self.breaker.on_outcome(self.generation, self.trial, false);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.resolved && self.trial {
            self.breaker.on_abandoned(self.generation);
        }
    }
}
