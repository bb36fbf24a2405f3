//! Breaker + retry + timeout around a single dependency.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use resilience::{CallError, CircuitBreaker, ResilienceConfig, RetryPolicy};

use crate::error::{ClientError, UnavailableCause};

/// Executes calls against one dependency under its breaker and retry policy.
///
/// Clones share the breaker, so every clone sees the same health state.
#[derive(Debug, Clone)]
pub struct GuardedClient {
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl GuardedClient {
    pub fn new(breaker: Arc<CircuitBreaker>, retry: RetryPolicy, call_timeout: Duration) -> Self {
        Self {
            breaker,
            retry,
            call_timeout,
        }
    }

    /// Builds a client with a fresh breaker named `dependency`.
    pub fn from_config(dependency: &str, config: &ResilienceConfig) -> Self {
        Self::new(
            Arc::new(CircuitBreaker::new(
                dependency,
                config.circuit_breaker.clone(),
            )),
            RetryPolicy::new(config.retry.clone()),
            config.call_timeout,
        )
    }

    pub fn dependency(&self) -> &str {
        self.breaker.name()
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// A client sharing this breaker that makes a single attempt per call,
    /// for operations that are unsafe to repeat.
    pub fn without_retry(&self) -> Self {
        Self::new(self.breaker.clone(), RetryPolicy::no_retry(), self.call_timeout)
    }

    /// Runs `call` until it succeeds, fails with a business error, the
    /// breaker refuses, or the retry budget is spent.
    ///
    /// The breaker is consulted before every attempt. Each attempt is
    /// bounded by the call timeout; a timeout counts as a transient failure.
    pub async fn execute<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CallError>>,
    {
        let dependency = self.dependency();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let permit = self.breaker.try_acquire().map_err(|open| {
                tracing::warn!(dependency, operation, "Call rejected, circuit is {}", open.state);
                record_call(dependency, operation, "rejected");
                ClientError::DependencyUnavailable {
                    dependency: dependency.to_string(),
                    cause: UnavailableCause::CircuitOpen(open),
                }
            })?;

            let outcome = match tokio::time::timeout(self.call_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(CallError::Timeout(self.call_timeout)),
            };

            let error = match outcome {
                Ok(value) => {
                    permit.record_success();
                    record_call(dependency, operation, "success");
                    return Ok(value);
                }
                Err(error) if !error.is_transient() => {
                    permit.record_success();
                    record_call(dependency, operation, "business_error");
                    return Err(ClientError::from_business(dependency, error));
                }
                Err(error) => {
                    permit.record_failure();
                    error
                }
            };

            if !self.retry.should_retry(attempt, &error) {
                tracing::error!(dependency, operation, attempt, %error, "Giving up on call");
                record_call(dependency, operation, "failure");
                return Err(ClientError::DependencyUnavailable {
                    dependency: dependency.to_string(),
                    cause: UnavailableCause::RetriesExhausted {
                        attempts: attempt,
                        last: error,
                    },
                });
            }

            let delay = self.retry.delay_for(attempt);
            tracing::warn!(
                dependency,
                operation,
                attempt,
                %error,
                delay_ms = delay.as_millis() as u64,
                "Retrying call"
            );
            metrics::counter!(
                "guarded_call_retries_total",
                "dependency" => dependency.to_string(),
                "operation" => operation.to_string()
            )
            .increment(1);
            tokio::time::sleep(delay).await;
        }
    }
}

fn record_call(dependency: &str, operation: &str, outcome: &'static str) {
    metrics::counter!(
        "guarded_calls_total",
        "dependency" => dependency.to_string(),
        "operation" => operation.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}
