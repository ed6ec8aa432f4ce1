//! Engine configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. Environment variable overrides (`TRIAGE_MAX_RETRIES`, ...)
//! 2. Values from a TOML file
//! 3. Built-in defaults (2 retries, 200 ms backoff, no step timeout)

use std::env;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::workflow::RetryPolicy;

const DEFAULT_BUS_CAPACITY: usize = 256;

const ENV_MAX_RETRIES: &str = "TRIAGE_MAX_RETRIES";
const ENV_STEP_TIMEOUT_SECS: &str = "TRIAGE_STEP_TIMEOUT_SECS";
const ENV_BUS_CAPACITY: &str = "TRIAGE_BUS_CAPACITY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {value}")]
    Env { var: &'static str, value: String },
}

/// Tunables for the orchestrator and event bus.
///
/// ```toml
/// step_timeout_secs = 30
/// bus_capacity = 512
///
/// [retry]
/// max_retries = 2
/// initial_backoff_ms = 200
/// max_backoff_ms = 5000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    pub retry: RetryPolicy,
    /// Per-step time budget; unset means no bound.
    pub step_timeout_secs: Option<u64>,
    /// Broadcast channel capacity for the event bus.
    pub bus_capacity: usize,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            step_timeout_secs: None,
            bus_capacity: DEFAULT_BUS_CAPACITY,
        }
    }
}

impl TriageConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Read a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)?.with_env_overrides()
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|var| env::var(var).ok())
    }

    fn with_overrides(
        mut self,
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(v) = lookup(ENV_MAX_RETRIES) {
            self.retry.max_retries = parse_env(ENV_MAX_RETRIES, &v)?;
        }
        if let Some(v) = lookup(ENV_STEP_TIMEOUT_SECS) {
            let secs: u64 = parse_env(ENV_STEP_TIMEOUT_SECS, &v)?;
            self.step_timeout_secs = (secs > 0).then_some(secs);
        }
        if let Some(v) = lookup(ENV_BUS_CAPACITY) {
            self.bus_capacity = parse_env(ENV_BUS_CAPACITY, &v)?;
        }
        Ok(self)
    }

    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout_secs.map(Duration::from_secs)
    }
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        var,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = TriageConfig::default();
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.step_timeout(), None);
        assert_eq!(config.bus_capacity, 256);
    }

    #[test]
    fn test_from_toml() {
        let config = TriageConfig::from_toml_str(
            r#"
            step_timeout_secs = 30

            [retry]
            max_retries = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.retry.max_retries, 4);
        assert_eq!(config.retry.initial_backoff_ms, 200);
        assert_eq!(config.step_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.bus_capacity, 256);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_MAX_RETRIES, "5"),
            (ENV_STEP_TIMEOUT_SECS, "0"),
            (ENV_BUS_CAPACITY, " 64 "),
        ]
        .into_iter()
        .collect();
        let config = TriageConfig {
            step_timeout_secs: Some(10),
            ..Default::default()
        }
        .with_overrides(|k| vars.get(k).map(|v| v.to_string()))
        .unwrap();
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.step_timeout_secs, None);
        assert_eq!(config.bus_capacity, 64);
    }

    #[test]
    fn test_bad_env_value() {
        let err = TriageConfig::default()
            .with_overrides(|k| (k == ENV_MAX_RETRIES).then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: ENV_MAX_RETRIES, .. }));
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bus_capacity = 32").unwrap();
        writeln!(file, "step_timeout_secs = 3").unwrap();
        writeln!(file, "[retry]").unwrap();
        writeln!(file, "initial_backoff_ms = 50").unwrap();

        let config = TriageConfig::load(file.path()).unwrap();
        assert_eq!(config.bus_capacity, 32);
        assert_eq!(config.step_timeout(), Some(Duration::from_secs(3)));
        assert_eq!(config.retry.initial_backoff_ms, 50);
        assert_eq!(config.retry.max_retries, 2);

        let missing = TriageConfig::load(Path::new("/definitely/not/here.toml"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }
}
