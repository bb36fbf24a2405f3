//! Application configuration loaded from environment variables.

use std::collections::HashMap;
use std::time::Duration;

use resilience::ResilienceConfig;
use thiserror::Error;

pub const USER_SERVICE: &str = "user-service";
pub const PRODUCT_SERVICE: &str = "product-service";

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: String, value: String },

    #[error("RESILIENCE_CONFIG is not valid JSON: {0}")]
    ResilienceJson(#[from] serde_json::Error),

    #[error("invalid resilience settings for {dependency}: {source}")]
    Resilience {
        dependency: &'static str,
        #[source]
        source: resilience::ConfigError,
    },
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `USER_SERVICE_URL`, `PRODUCT_SERVICE_URL` — base URLs of the remote services
/// - `DATABASE_URL` — when set, the event log and inventory live in PostgreSQL
/// - `EVENT_LOG_PARTITIONS` — partitions per topic (default: `3`)
/// - `RECONCILER_GROUP` — consumer group of the inventory reconciler
/// - `OUTBOX_FLUSH_INTERVAL_MS` — how often undelivered events are retried
/// - `RESILIENCE_CONFIG` — JSON object keyed by dependency name, each value a
///   (partial) [`ResilienceConfig`]
/// - `{USER,PRODUCT}_SERVICE_{CB_FAILURE_RATE, CB_WINDOW_SIZE, CB_MINIMUM_CALLS,
///   CB_OPEN_DURATION_MS, CB_HALF_OPEN_TRIALS, RETRY_MAX_ATTEMPTS, TIMEOUT_MS}` —
///   single-field overrides applied on top of the JSON
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub user_service_url: String,
    pub product_service_url: String,
    pub database_url: Option<String>,
    pub event_log_partitions: u32,
    pub reconciler_group: String,
    pub outbox_flush_interval: Duration,
    pub user_service: ResilienceConfig,
    pub product_service: ResilienceConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let mut blobs: HashMap<String, ResilienceConfig> = match lookup("RESILIENCE_CONFIG") {
            Some(json) => serde_json::from_str(&json)?,
            None => HashMap::new(),
        };
        let mut resilience_for = |dependency: &'static str, prefix: &str| {
            let mut config = blobs.remove(dependency).unwrap_or_default();
            apply_overrides(&mut config, prefix, &lookup)?;
            config
                .validate()
                .map_err(|source| ConfigError::Resilience { dependency, source })?;
            Ok::<_, ConfigError>(config)
        };
        let user_service = resilience_for(USER_SERVICE, "USER_SERVICE")?;
        let product_service = resilience_for(PRODUCT_SERVICE, "PRODUCT_SERVICE")?;

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port)?,
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            user_service_url: lookup("USER_SERVICE_URL").unwrap_or(defaults.user_service_url),
            product_service_url: lookup("PRODUCT_SERVICE_URL")
                .unwrap_or(defaults.product_service_url),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            event_log_partitions: parse_or(
                &lookup,
                "EVENT_LOG_PARTITIONS",
                defaults.event_log_partitions,
            )?
            .max(1),
            reconciler_group: lookup("RECONCILER_GROUP").unwrap_or(defaults.reconciler_group),
            outbox_flush_interval: Duration::from_millis(parse_or(
                &lookup,
                "OUTBOX_FLUSH_INTERVAL_MS",
                defaults.outbox_flush_interval.as_millis() as u64,
            )?),
            user_service,
            product_service,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            user_service_url: "http://localhost:8081".to_string(),
            product_service_url: "http://localhost:8082".to_string(),
            database_url: None,
            event_log_partitions: 3,
            reconciler_group: "inventory-reconciler".to_string(),
            outbox_flush_interval: Duration::from_secs(1),
            user_service: ResilienceConfig::default(),
            product_service: ResilienceConfig::default(),
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            var: var.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

fn apply_overrides(
    config: &mut ResilienceConfig,
    prefix: &str,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    let var = |suffix: &str| format!("{prefix}_{suffix}");
    let breaker = &mut config.circuit_breaker;

    breaker.failure_rate_threshold = parse_or(
        lookup,
        &var("CB_FAILURE_RATE"),
        breaker.failure_rate_threshold,
    )?;
    breaker.sliding_window_size =
        parse_or(lookup, &var("CB_WINDOW_SIZE"), breaker.sliding_window_size)?;
    breaker.minimum_calls = parse_or(lookup, &var("CB_MINIMUM_CALLS"), breaker.minimum_calls)?;
    breaker.half_open_trials =
        parse_or(lookup, &var("CB_HALF_OPEN_TRIALS"), breaker.half_open_trials)?;
    breaker.open_duration = Duration::from_millis(parse_or(
        lookup,
        &var("CB_OPEN_DURATION_MS"),
        breaker.open_duration.as_millis() as u64,
    )?);

    config.retry.max_attempts =
        parse_or(lookup, &var("RETRY_MAX_ATTEMPTS"), config.retry.max_attempts)?;
    config.call_timeout = Duration::from_millis(parse_or(
        lookup,
        &var("TIMEOUT_MS"),
        config.call_timeout.as_millis() as u64,
    )?);
    Ok(())
}
