//! Worker configuration loaded from environment variables.

use std::net::{AddrParseError, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use saga::{ActivityOptions, EngineConfig, RetryPolicy};

/// Worker configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `FULFILLMENT_WINDOW_SECS`: deadline after fulfillment starts (default: `900`)
/// - `LEDGER_CHECKPOINT_AFTER`: ledger entries per epoch (default: `1000`)
/// - `ACTIVITY_TIMEOUT_SECS`: timeout of one payment call (default: `300`)
/// - `ACTIVITY_MAX_ATTEMPTS`: attempts per payment call (default: `3`)
/// - `FINISHED_RETENTION_SECS`: how long finished orders stay queryable (default: `600`)
/// - `METRICS_HOST`: Prometheus listener address (default: `"0.0.0.0"`)
/// - `METRICS_PORT`: Prometheus listener port (default: `9000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub fulfillment_window_secs: u64,
    pub ledger_checkpoint_after: usize,
    pub activity_timeout_secs: u64,
    pub activity_max_attempts: u32,
    pub finished_retention_secs: u64,
    pub metrics_host: String,
    pub metrics_port: u16,
    pub log_level: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            fulfillment_window_secs: parse_var(&lookup, "FULFILLMENT_WINDOW_SECS")
                .unwrap_or(defaults.fulfillment_window_secs),
            ledger_checkpoint_after: parse_var(&lookup, "LEDGER_CHECKPOINT_AFTER")
                .unwrap_or(defaults.ledger_checkpoint_after),
            activity_timeout_secs: parse_var(&lookup, "ACTIVITY_TIMEOUT_SECS")
                .unwrap_or(defaults.activity_timeout_secs),
            activity_max_attempts: parse_var(&lookup, "ACTIVITY_MAX_ATTEMPTS")
                .unwrap_or(defaults.activity_max_attempts),
            finished_retention_secs: parse_var(&lookup, "FINISHED_RETENTION_SECS")
                .unwrap_or(defaults.finished_retention_secs),
            metrics_host: lookup("METRICS_HOST").unwrap_or(defaults.metrics_host),
            metrics_port: parse_var(&lookup, "METRICS_PORT").unwrap_or(defaults.metrics_port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
        }
    }

    /// Returns the engine settings this configuration describes.
    pub fn engine_config(&self) -> EngineConfig {
        let activity = ActivityOptions {
            start_to_close_timeout: Duration::from_secs(self.activity_timeout_secs),
            retry: RetryPolicy {
                max_attempts: self.activity_max_attempts,
                ..RetryPolicy::default()
            },
        };

        EngineConfig::default()
            .with_fulfillment_window(Duration::from_secs(self.fulfillment_window_secs))
            .with_ledger_checkpoint_after(self.ledger_checkpoint_after)
            .with_activity(activity)
            .with_finished_retention(Duration::from_secs(self.finished_retention_secs))
    }

    /// Returns the Prometheus listener address.
    pub fn metrics_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.metrics_host, self.metrics_port).parse()
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|value| value.parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fulfillment_window_secs: 15 * 60,
            ledger_checkpoint_after: 1000,
            activity_timeout_secs: 5 * 60,
            activity_max_attempts: 3,
            finished_retention_secs: 10 * 60,
            metrics_host: "0.0.0.0".to_string(),
            metrics_port: 9000,
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.fulfillment_window_secs, 900);
        assert_eq!(config.ledger_checkpoint_after, 1000);
        assert_eq!(config.metrics_port, 9000);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_reads_overrides_and_ignores_garbage() {
        let env = HashMap::from([
            ("FULFILLMENT_WINDOW_SECS", "60"),
            ("LEDGER_CHECKPOINT_AFTER", "not-a-number"),
            ("METRICS_HOST", "127.0.0.1"),
            ("RUST_LOG", "debug"),
        ]);
        let config = Config::from_lookup(|key| env.get(key).map(|value| value.to_string()));

        assert_eq!(config.fulfillment_window_secs, 60);
        assert_eq!(config.ledger_checkpoint_after, 1000);
        assert_eq!(config.metrics_host, "127.0.0.1");
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_engine_config() {
        let config = Config {
            fulfillment_window_secs: 60,
            ledger_checkpoint_after: 50,
            activity_timeout_secs: 10,
            activity_max_attempts: 5,
            finished_retention_secs: 30,
            ..Config::default()
        };
        let engine = config.engine_config();

        assert_eq!(engine.fulfillment_window, Duration::from_secs(60));
        assert_eq!(engine.ledger_checkpoint_after, 50);
        assert_eq!(engine.activity.start_to_close_timeout, Duration::from_secs(10));
        assert_eq!(engine.activity.retry.max_attempts, 5);
        assert_eq!(engine.finished_retention, Duration::from_secs(30));
    }

    #[test]
    fn test_metrics_addr() {
        let config = Config {
            metrics_host: "127.0.0.1".to_string(),
            metrics_port: 9100,
            ..Config::default()
        };
        assert_eq!(config.metrics_addr().unwrap().to_string(), "127.0.0.1:9100");

        let config = Config {
            metrics_host: "not an address".to_string(),
            ..Config::default()
        };
        assert!(config.metrics_addr().is_err());
    }
}
