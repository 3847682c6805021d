//! Configuration types.

use crate::error::{Error, Result as CrateResult};
use crate::sync::{DEFAULT_INTERVAL, STALE_GRACE, SyncSettings};
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Directory name used under the platform config directory.
pub const APP_DIR: &str = "crossnote";

/// Task index configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Path to the SQLite task index.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    app_config_dir()
        .map(|dir| dir.join("tasks.db"))
        .unwrap_or_else(|| PathBuf::from("tasks.db"))
}

/// `<platform config dir>/crossnote`, when the platform has one.
pub fn app_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR))
}

/// Scheduled sync configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Run the scheduled pass while serving (default: true).
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Seconds between scheduled passes (default: 30).
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Seconds after which a project is re-pulled even without changes.
    /// Defaults to the interval plus 5.
    #[serde(default)]
    pub stale_after_secs: Option<u64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval_secs(),
            stale_after_secs: None,
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL.as_secs()
}

impl SyncConfig {
    pub fn effective_stale_after_secs(&self) -> u64 {
        self.stale_after_secs
            .unwrap_or_else(|| self.interval_secs.saturating_add(STALE_GRACE.as_secs()))
    }

    /// Checked conversion into synchronizer settings.
    pub fn settings(&self) -> CrateResult<SyncSettings> {
        if self.interval_secs == 0 {
            return Err(Error::Config("sync.interval_secs must be at least 1".into()));
        }
        let stale_after = self.effective_stale_after_secs();
        if stale_after < self.interval_secs {
            return Err(Error::Config(format!(
                "sync.stale_after_secs ({}) must not be shorter than sync.interval_secs ({})",
                stale_after, self.interval_secs
            )));
        }
        Ok(SyncSettings {
            interval: Duration::from_secs(self.interval_secs),
            stale_after: Duration::from_secs(stale_after),
        })
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub sync: SyncConfig,
}

impl Config {
    /// Reject settings the synchronizer can't run with.
    pub fn validate(&self) -> Result<()> {
        self.sync.settings()?;
        if self.index.db_path.as_os_str().is_empty() {
            return Err(anyhow!("index.db_path must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert!(config.sync.enabled);
        assert_eq!(config.sync.interval_secs, 30);
        assert_eq!(config.sync.effective_stale_after_secs(), 35);
        assert!(config.index.db_path.ends_with("tasks.db"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn stale_threshold_follows_interval() {
        let sync = SyncConfig {
            interval_secs: 60,
            ..Default::default()
        };
        let settings = sync.settings().unwrap();
        assert_eq!(settings.interval, Duration::from_secs(60));
        assert_eq!(settings.stale_after, Duration::from_secs(65));
    }

    #[test]
    fn rejects_zero_interval() {
        let mut config = Config::default();
        config.sync.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_stale_threshold_below_interval() {
        let sync = SyncConfig {
            interval_secs: 30,
            stale_after_secs: Some(10),
            ..Default::default()
        };
        assert!(matches!(sync.settings(), Err(Error::Config(_))));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: Config = serde_yaml::from_str("sync:\n  interval_secs: 10\n").unwrap();
        assert_eq!(config.sync.interval_secs, 10);
        assert!(config.sync.enabled);
        assert_eq!(config.index, IndexConfig::default());
    }
}
