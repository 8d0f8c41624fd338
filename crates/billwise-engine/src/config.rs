//! # Engine Configuration
//!
//! Settings loaded once at startup.
//!
//! ## Configuration Sources (Priority Order)
//! 1. Environment variables (`BILLWISE_*`)
//! 2. Config file (`billwise.toml`, optional)
//! 3. Defaults (this file)
//!
//! Configuration is read-only after loading; the dispatcher keeps it behind
//! an `Arc` together with the other collaborators.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use directories::ProjectDirs;
use thiserror::Error;

use billwise_core::RECENT_DOCUMENT_WINDOW;

use crate::guard::GuardConfig;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// SQLite database file.
    pub database_path: PathBuf,

    /// How long a second create waits before re-checking the guard.
    pub guard_grace_ms: u64,

    /// In-flight guard entries older than this are swept.
    pub guard_stale_secs: u64,

    /// How long an identical create is rejected after a success.
    pub duplicate_window_secs: u64,

    /// Documents considered by the most-recent fallback.
    pub recent_window: u32,

    /// Invoices + estimates allowed on the free plan.
    pub free_plan_document_limit: i64,

    /// Payment terms for owners that never saved settings.
    pub default_payment_terms_days: i64,

    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            database_path: default_database_path(),
            guard_grace_ms: 1_000,
            guard_stale_secs: 30,
            duplicate_window_secs: 10,
            recent_window: RECENT_DOCUMENT_WINDOW,
            free_plan_document_limit: 25,
            default_payment_terms_days: 30,
            log_filter: "info,billwise=debug,sqlx=warn".to_string(),
        }
    }
}

impl EngineConfig {
    /// Defaults, then the optional TOML file, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => EngineConfig::from_toml_file(path)?,
            None => EngineConfig::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        EngineConfig::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Applies `BILLWISE_*` overrides read through `lookup`.
    ///
    /// ## Environment Variables
    /// - `BILLWISE_DB_PATH`: database file
    /// - `BILLWISE_GUARD_GRACE_MS`, `BILLWISE_GUARD_STALE_SECS`,
    ///   `BILLWISE_DUPLICATE_WINDOW_SECS`: creation guard timing
    /// - `BILLWISE_RECENT_WINDOW`: most-recent fallback window
    /// - `BILLWISE_FREE_PLAN_LIMIT`: free plan document limit
    /// - `BILLWISE_PAYMENT_TERMS_DAYS`: default payment terms
    /// - `BILLWISE_LOG`: default log filter
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("BILLWISE_DB_PATH") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(raw) = lookup("BILLWISE_GUARD_GRACE_MS") {
            self.guard_grace_ms = parse_var("BILLWISE_GUARD_GRACE_MS", &raw)?;
        }
        if let Some(raw) = lookup("BILLWISE_GUARD_STALE_SECS") {
            self.guard_stale_secs = parse_var("BILLWISE_GUARD_STALE_SECS", &raw)?;
        }
        if let Some(raw) = lookup("BILLWISE_DUPLICATE_WINDOW_SECS") {
            self.duplicate_window_secs = parse_var("BILLWISE_DUPLICATE_WINDOW_SECS", &raw)?;
        }
        if let Some(raw) = lookup("BILLWISE_RECENT_WINDOW") {
            self.recent_window = parse_var("BILLWISE_RECENT_WINDOW", &raw)?;
        }
        if let Some(raw) = lookup("BILLWISE_FREE_PLAN_LIMIT") {
            self.free_plan_document_limit = parse_var("BILLWISE_FREE_PLAN_LIMIT", &raw)?;
        }
        if let Some(raw) = lookup("BILLWISE_PAYMENT_TERMS_DAYS") {
            self.default_payment_terms_days = parse_var("BILLWISE_PAYMENT_TERMS_DAYS", &raw)?;
        }
        if let Some(filter) = lookup("BILLWISE_LOG") {
            self.log_filter = filter;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recent_window == 0 {
            return Err(ConfigError::Invalid(
                "recent_window must be at least 1".to_string(),
            ));
        }
        if self.guard_stale_secs == 0 {
            return Err(ConfigError::Invalid(
                "guard_stale_secs must be at least 1".to_string(),
            ));
        }
        if self.free_plan_document_limit < 0 || self.default_payment_terms_days < 0 {
            return Err(ConfigError::Invalid(
                "limits and payment terms cannot be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn guard_config(&self) -> GuardConfig {
        GuardConfig {
            grace: Duration::from_millis(self.guard_grace_ms),
            stale_after: Duration::from_secs(self.guard_stale_secs),
            duplicate_window: Duration::from_secs(self.duplicate_window_secs),
        }
    }

    /// Configuration for tests: in-memory database, short guard grace.
    pub fn for_tests() -> Self {
        EngineConfig {
            database_path: PathBuf::from(":memory:"),
            guard_grace_ms: 50,
            ..EngineConfig::default()
        }
    }
}

/// Platform data directory, or the working directory when there is none.
///
/// - **macOS**: `~/Library/Application Support/com.billwise.billwise/billwise.db`
/// - **Linux**: `~/.local/share/billwise/billwise.db`
fn default_database_path() -> PathBuf {
    ProjectDirs::from("com", "billwise", "billwise")
        .map(|dirs| dirs.data_dir().join("billwise.db"))
        .unwrap_or_else(|| PathBuf::from("billwise.db"))
}

fn parse_var<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.guard_grace_ms, 1_000);
        assert_eq!(config.guard_stale_secs, 30);
        assert_eq!(config.recent_window, 5);
        assert!(config.database_path.ends_with("billwise.db"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_overrides_only_given_keys() {
        let config = EngineConfig::from_toml_str(
            r#"
            database_path = "/tmp/books.db"
            recent_window = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/books.db"));
        assert_eq!(config.recent_window, 8);
        assert_eq!(config.duplicate_window_secs, 10);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("BILLWISE_DB_PATH", "/data/b.db"),
            ("BILLWISE_GUARD_GRACE_MS", "250"),
            ("BILLWISE_FREE_PLAN_LIMIT", "3"),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config
            .apply_env(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/data/b.db"));
        assert_eq!(config.guard_grace_ms, 250);
        assert_eq!(config.free_plan_document_limit, 3);
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = EngineConfig::default();
        let err = config
            .apply_env(|key| (key == "BILLWISE_RECENT_WINDOW").then(|| "five".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_zero_window_rejected() {
        let config = EngineConfig {
            recent_window: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            EngineConfig::from_toml_str("recent_window = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
