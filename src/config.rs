//! Configuration for the transaction relay.
//!
//! Configuration can be constructed programmatically, deserialized from
//! YAML/JSON, or read from the process environment (optionally seeded from a
//! `.env` file) with [`RelayConfig::from_env()`].
//!
//! # Configuration Structure
//!
//! ```text
//! RelayConfig
//! ├── source: SourceConfig            # MySQL holding the binlog
//! ├── tables: TrackedTables           # start / stop / stop-failed table names
//! ├── destination: DestinationConfig  # PostgreSQL receiving transactions
//! └── settings: RelaySettings
//!     ├── failure_policy              # strict | retry
//!     ├── retry: WriteRetryConfig     # only used by the retry policy
//!     └── drain_timeout               # how long shutdown waits for the consumer
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Field |
//! |----------|-------|
//! | `STEVE_DB_HOST` / `STEVE_DB_PORT` | `source.host` / `source.port` |
//! | `STEVE_DB_USERNAME` / `STEVE_DB_PASSWORD` | `source.user` / `source.password` |
//! | `STEVE_DB_DATABASE_NAME` | `source.database` |
//! | `STEVE_DB_TABLE_NAME_ONE` | `tables.start` |
//! | `STEVE_DB_TABLE_NAME_TWO` | `tables.stop_normal` |
//! | `STEVE_DB_TABLE_NAME_THREE` | `tables.stop_failed` |
//! | `DB_HOST` / `DB_PORT` | `destination.host` / `destination.port` |
//! | `DB_USER` / `DB_PASS` / `DB_NAME` | `destination.user` / `.password` / `.database` |
//! | `SSL_MODE` | `destination.ssl_mode` |
//! | `DB_MAX_CONNECTIONS` (optional) | `destination.max_connections` |
//! | `RELAY_DESTINATION_TABLE` (optional) | `destination.table` |
//! | `RELAY_FAILURE_POLICY` (optional) | `settings.failure_policy` |
//! | `RELAY_DRAIN_TIMEOUT` (optional) | `settings.drain_timeout` |
//!
//! # YAML Example
//!
//! ```yaml
//! source:
//!   host: "steve-db"
//!   port: 3306
//!   user: "replicator"
//!   password: "secret"
//!   database: "stevedb"
//! tables:
//!   start: "transaction_start"
//!   stop_normal: "transaction_stop"
//!   stop_failed: "transaction_stop_failed"
//! destination:
//!   host: "analytics-db"
//!   port: 5432
//!   user: "relay"
//!   password: "secret"
//!   database: "charging"
//!   ssl_mode: "require"
//! settings:
//!   failure_policy: strict
//!   drain_timeout: "10s"
//! ```

use crate::error::{RelayError, Result};
use crate::resilience::RetryConfig;
use serde::{Deserialize, Serialize};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use std::collections::HashMap;
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// Top-level config
// ═══════════════════════════════════════════════════════════════════════════════

/// The top-level config object passed to `RelayEngine::new()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Source store holding the replication log.
    pub source: SourceConfig,

    /// Source tables that drive the transaction lifecycle.
    pub tables: TrackedTables,

    /// Destination store receiving the mirrored transactions.
    pub destination: DestinationConfig,

    #[serde(default)]
    pub settings: RelaySettings,
}

impl RelayConfig {
    /// Load config from the process environment.
    ///
    /// A `.env` file in the working directory is loaded first if present;
    /// variables already set in the environment take precedence.
    pub fn from_env() -> Result<Self> {
        load_env_file(None)?;
        Self::from_vars(std::env::vars())
    }

    /// Build config from an explicit set of variables.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let env = EnvMap(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect());

        let source = SourceConfig {
            host: env.required("STEVE_DB_HOST")?,
            port: env.parsed("STEVE_DB_PORT")?,
            user: env.required("STEVE_DB_USERNAME")?,
            password: env.required("STEVE_DB_PASSWORD")?,
            database: env.required("STEVE_DB_DATABASE_NAME")?,
        };

        let tables = TrackedTables {
            start: env.required("STEVE_DB_TABLE_NAME_ONE")?,
            stop_normal: env.required("STEVE_DB_TABLE_NAME_TWO")?,
            stop_failed: env.required("STEVE_DB_TABLE_NAME_THREE")?,
        };

        let destination = DestinationConfig {
            host: env.required("DB_HOST")?,
            port: env.parsed("DB_PORT")?,
            user: env.required("DB_USER")?,
            password: env.required("DB_PASS")?,
            database: env.required("DB_NAME")?,
            ssl_mode: env.required("SSL_MODE")?,
            table: env.optional("RELAY_DESTINATION_TABLE").unwrap_or_else(default_table),
            max_connections: match env.optional("DB_MAX_CONNECTIONS") {
                Some(_) => env.parsed("DB_MAX_CONNECTIONS")?,
                None => default_max_connections(),
            },
            acquire_timeout: default_acquire_timeout(),
        };

        let mut settings = RelaySettings::default();
        if let Some(policy) = env.optional("RELAY_FAILURE_POLICY") {
            settings.failure_policy = match policy.to_ascii_lowercase().as_str() {
                "strict" => FailurePolicy::Strict,
                "retry" => FailurePolicy::Retry,
                other => {
                    return Err(RelayError::Config(format!(
                        "RELAY_FAILURE_POLICY must be 'strict' or 'retry', got '{}'",
                        other
                    )))
                }
            };
        }
        if let Some(timeout) = env.optional("RELAY_DRAIN_TIMEOUT") {
            humantime::parse_duration(&timeout).map_err(|e| {
                RelayError::Config(format!("Invalid RELAY_DRAIN_TIMEOUT '{}': {}", timeout, e))
            })?;
            settings.drain_timeout = timeout;
        }

        let config = Self {
            source,
            tables,
            destination,
            settings,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configs the relay cannot run with.
    pub fn validate(&self) -> Result<()> {
        let names = [
            &self.tables.start,
            &self.tables.stop_normal,
            &self.tables.stop_failed,
        ];
        if names.iter().any(|n| n.is_empty()) {
            return Err(RelayError::Config("Tracked table names must not be empty".to_string()));
        }
        if names[0] == names[1] || names[0] == names[2] || names[1] == names[2] {
            return Err(RelayError::Config(
                "Tracked table names must be distinct".to_string(),
            ));
        }
        if !is_identifier(&self.destination.table) {
            return Err(RelayError::Config(format!(
                "Destination table '{}' is not a plain identifier",
                self.destination.table
            )));
        }
        if self.destination.max_connections == 0 {
            return Err(RelayError::Config(
                "Destination max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Create a config for tests. Nothing here points at a real server.
    pub fn for_testing() -> Self {
        Self {
            source: SourceConfig {
                host: "localhost".to_string(),
                port: 3306,
                user: "root".to_string(),
                password: "root".to_string(),
                database: "stevedb".to_string(),
            },
            tables: TrackedTables::default(),
            destination: DestinationConfig {
                host: "localhost".to_string(),
                port: 5432,
                user: "postgres".to_string(),
                password: "postgres".to_string(),
                database: "postgres".to_string(),
                ssl_mode: "disable".to_string(),
                table: default_table(),
                max_connections: 1,
                acquire_timeout: "1s".to_string(),
            },
            settings: RelaySettings::default(),
        }
    }
}

/// Variable lookup with config-flavoured errors.
struct EnvMap(HashMap<String, String>);

impl EnvMap {
    fn optional(&self, key: &str) -> Option<String> {
        self.0.get(key).filter(|v| !v.is_empty()).cloned()
    }

    fn required(&self, key: &str) -> Result<String> {
        self.optional(key)
            .ok_or_else(|| RelayError::Config(format!("Missing environment variable {}", key)))
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str) -> Result<T>
    where
        T::Err: std::fmt::Display,
    {
        let raw = self.required(key)?;
        raw.parse()
            .map_err(|e| RelayError::Config(format!("Invalid {} '{}': {}", key, raw, e)))
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !s.starts_with(|c: char| c.is_ascii_digit())
}

// ═══════════════════════════════════════════════════════════════════════════════
// SourceConfig
// ═══════════════════════════════════════════════════════════════════════════════

/// Source (MySQL) connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl SourceConfig {
    pub fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }

    /// Open a small pool used for the startup baseline query.
    pub async fn connect(&self) -> Result<MySqlPool> {
        MySqlPoolOptions::new()
            .max_connections(1)
            .connect_with(self.connect_options())
            .await
            .map_err(RelayError::Source)
    }

    /// `host:port` address, as binlog readers expect it.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Source tables mapped onto lifecycle transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedTables {
    pub start: String,
    pub stop_normal: String,
    pub stop_failed: String,
}

impl Default for TrackedTables {
    fn default() -> Self {
        Self {
            start: "transaction_start".to_string(),
            stop_normal: "transaction_stop".to_string(),
            stop_failed: "transaction_stop_failed".to_string(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DestinationConfig
// ═══════════════════════════════════════════════════════════════════════════════

/// Destination (PostgreSQL) connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,

    /// libpq-style sslmode ("disable", "prefer", "require", ...).
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,

    /// Table receiving transaction rows.
    #[serde(default = "default_table")]
    pub table: String,

    /// Pool size. Writes are sequential, so one connection is enough.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a write waits for a pooled connection (e.g. "5s").
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout: String,
}

fn default_ssl_mode() -> String {
    "prefer".to_string()
}

fn default_table() -> String {
    "transaction".to_string()
}

fn default_max_connections() -> u32 {
    2
}

fn default_acquire_timeout() -> String {
    "5s".to_string()
}

impl DestinationConfig {
    pub fn acquire_timeout_duration(&self) -> Duration {
        humantime::parse_duration(&self.acquire_timeout).unwrap_or(Duration::from_secs(5))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RelaySettings
// ═══════════════════════════════════════════════════════════════════════════════

/// What happens when a destination write fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop replication on the first write that fails.
    #[default]
    Strict,
    /// Retry transient destination errors with backoff, then stop.
    Retry,
}

/// Tunables for the relay loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaySettings {
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    #[serde(default)]
    pub retry: WriteRetryConfig,

    /// How long `shutdown()` waits for the consumer to finish its current
    /// event (e.g. "10s").
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout: String,
}

fn default_drain_timeout() -> String {
    "10s".to_string()
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::Strict,
            retry: WriteRetryConfig::default(),
            drain_timeout: default_drain_timeout(),
        }
    }
}

impl RelaySettings {
    pub fn drain_timeout_duration(&self) -> Duration {
        humantime::parse_duration(&self.drain_timeout).unwrap_or(Duration::from_secs(10))
    }
}

/// Destination write retry settings (retry failure policy only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteRetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    #[serde(default = "default_initial_delay")]
    pub initial_delay: String,

    #[serde(default = "default_max_delay")]
    pub max_delay: String,
}

fn default_max_attempts() -> usize {
    5
}

fn default_initial_delay() -> String {
    "100ms".to_string()
}

fn default_max_delay() -> String {
    "5s".to_string()
}

impl Default for WriteRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
        }
    }
}

impl WriteRetryConfig {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts.max(1),
            initial_delay: humantime::parse_duration(&self.initial_delay)
                .unwrap_or(Duration::from_millis(100)),
            max_delay: humantime::parse_duration(&self.max_delay)
                .unwrap_or(Duration::from_secs(5)),
            ..RetryConfig::default()
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

/// Load a `.env` file into the process environment.
///
/// `None` searches the working directory and its parents. A missing file is
/// fine; a file that exists but cannot be read or parsed is a config error.
pub fn load_env_file(path: Option<&std::path::Path>) -> Result<()> {
    let loaded = match path {
        Some(path) => dotenvy::from_path(path),
        None => dotenvy::dotenv().map(|_| ()),
    };
    match loaded {
        Ok(()) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(RelayError::Config(format!("Failed to load .env file: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_vars() -> Vec<(&'static str, &'static str)> {
        vec![
            ("STEVE_DB_HOST", "steve-db"),
            ("STEVE_DB_PORT", "3306"),
            ("STEVE_DB_USERNAME", "replicator"),
            ("STEVE_DB_PASSWORD", "secret"),
            ("STEVE_DB_DATABASE_NAME", "stevedb"),
            ("STEVE_DB_TABLE_NAME_ONE", "transaction_start"),
            ("STEVE_DB_TABLE_NAME_TWO", "transaction_stop"),
            ("STEVE_DB_TABLE_NAME_THREE", "transaction_stop_failed"),
            ("DB_HOST", "analytics-db"),
            ("DB_PORT", "5432"),
            ("DB_USER", "relay"),
            ("DB_PASS", "pw"),
            ("DB_NAME", "charging"),
            ("SSL_MODE", "disable"),
        ]
    }

    #[test]
    fn test_from_vars_minimal() {
        let config = RelayConfig::from_vars(base_vars()).unwrap();
        assert_eq!(config.source.addr(), "steve-db:3306");
        assert_eq!(config.source.database, "stevedb");
        assert_eq!(config.tables.start, "transaction_start");
        assert_eq!(config.tables.stop_normal, "transaction_stop");
        assert_eq!(config.tables.stop_failed, "transaction_stop_failed");
        assert_eq!(config.destination.host, "analytics-db");
        assert_eq!(config.destination.port, 5432);
        assert_eq!(config.destination.ssl_mode, "disable");
        assert_eq!(config.destination.table, "transaction");
        assert_eq!(config.destination.max_connections, 2);
        assert_eq!(config.settings.failure_policy, FailurePolicy::Strict);
    }

    #[test]
    fn test_from_vars_missing_variable() {
        let vars: Vec<_> = base_vars().into_iter().filter(|(k, _)| *k != "DB_PASS").collect();
        let err = RelayConfig::from_vars(vars).unwrap_err();
        assert!(err.to_string().contains("DB_PASS"));
    }

    #[test]
    fn test_from_vars_empty_counts_as_missing() {
        let mut vars = base_vars();
        vars.push(("STEVE_DB_HOST", ""));
        let err = RelayConfig::from_vars(vars).unwrap_err();
        assert!(err.to_string().contains("STEVE_DB_HOST"));
    }

    #[test]
    fn test_from_vars_bad_port() {
        let mut vars = base_vars();
        vars.push(("DB_PORT", "not-a-port"));
        let err = RelayConfig::from_vars(vars).unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));
        assert!(err.to_string().contains("DB_PORT"));
    }

    #[test]
    fn test_from_vars_optional_overrides() {
        let mut vars = base_vars();
        vars.push(("RELAY_FAILURE_POLICY", "Retry"));
        vars.push(("RELAY_DRAIN_TIMEOUT", "30s"));
        vars.push(("RELAY_DESTINATION_TABLE", "charging_transaction"));
        vars.push(("DB_MAX_CONNECTIONS", "4"));
        let config = RelayConfig::from_vars(vars).unwrap();
        assert_eq!(config.settings.failure_policy, FailurePolicy::Retry);
        assert_eq!(config.settings.drain_timeout_duration(), Duration::from_secs(30));
        assert_eq!(config.destination.table, "charging_transaction");
        assert_eq!(config.destination.max_connections, 4);
    }

    #[test]
    fn test_from_vars_bad_policy() {
        let mut vars = base_vars();
        vars.push(("RELAY_FAILURE_POLICY", "yolo"));
        assert!(RelayConfig::from_vars(vars).is_err());
    }

    #[test]
    fn test_from_vars_bad_drain_timeout() {
        let mut vars = base_vars();
        vars.push(("RELAY_DRAIN_TIMEOUT", "soon"));
        assert!(RelayConfig::from_vars(vars).is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_tables() {
        let mut config = RelayConfig::for_testing();
        config.tables.stop_failed = config.tables.stop_normal.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_injected_table_name() {
        let mut config = RelayConfig::for_testing();
        config.destination.table = "transaction; DROP TABLE x".to_string();
        assert!(config.validate().is_err());
        config.destination.table = "1transaction".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_for_testing_is_valid() {
        assert!(RelayConfig::for_testing().validate().is_ok());
    }

    #[test]
    fn test_settings_defaults() {
        let settings = RelaySettings::default();
        assert_eq!(settings.failure_policy, FailurePolicy::Strict);
        assert_eq!(settings.drain_timeout_duration(), Duration::from_secs(10));
        assert_eq!(settings.retry.max_attempts, 5);
    }

    #[test]
    fn test_drain_timeout_invalid_fallback() {
        let settings = RelaySettings {
            drain_timeout: "whenever".to_string(),
            ..Default::default()
        };
        assert_eq!(settings.drain_timeout_duration(), Duration::from_secs(10));
    }

    #[test]
    fn test_write_retry_to_retry_config() {
        let retry = WriteRetryConfig {
            max_attempts: 0,
            initial_delay: "250ms".to_string(),
            max_delay: "2s".to_string(),
        }
        .to_retry_config();
        assert_eq!(retry.max_attempts, 1);
        assert_eq!(retry.initial_delay, Duration::from_millis(250));
        assert_eq!(retry.max_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = RelayConfig::for_testing();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: RelayConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.tables.start, "transaction_start");
        assert_eq!(parsed.destination.table, "transaction");
        assert_eq!(parsed.settings.failure_policy, FailurePolicy::Strict);
    }

    #[test]
    fn test_config_json_defaults_applied() {
        let json = r#"{
            "source": {"host": "h", "port": 3306, "user": "u", "password": "p", "database": "d"},
            "tables": {"start": "a", "stop_normal": "b", "stop_failed": "c"},
            "destination": {"host": "h", "port": 5432, "user": "u", "password": "p", "database": "d"},
            "settings": {"failure_policy": "retry"}
        }"#;
        let config: RelayConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.destination.ssl_mode, "prefer");
        assert_eq!(config.destination.table, "transaction");
        assert_eq!(config.destination.acquire_timeout_duration(), Duration::from_secs(5));
        assert_eq!(config.settings.failure_policy, FailurePolicy::Retry);
        assert_eq!(config.settings.drain_timeout, "10s");
    }

    #[test]
    fn test_missing_env_file_is_ignored() {
        let path = std::env::temp_dir().join("txn-relay-no-such-dir/.env");
        assert!(load_env_file(Some(&path)).is_ok());
    }

    #[test]
    fn test_malformed_env_file_is_config_error() {
        let path = std::env::temp_dir().join(format!("txn-relay-malformed-{}.env", std::process::id()));
        std::fs::write(&path, "THIS LINE HAS NO EQUALS SIGN\n").unwrap();
        let result = load_env_file(Some(&path));
        let _ = std::fs::remove_file(&path);
        assert!(matches!(result, Err(RelayError::Config(_))));
    }
}
