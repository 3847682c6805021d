//! Configuration loader with tier-based merging.
//!
//! Loads configuration from multiple tiers and merges them field-by-field.

use super::merge::deep_merge_all;
use super::types::{Config, app_config_dir};
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const ENV_CONFIG_PATH: &str = "CROSSNOTE_CONFIG_PATH";
pub const ENV_DB_PATH: &str = "CROSSNOTE_DB_PATH";
pub const ENV_SYNC_INTERVAL: &str = "CROSSNOTE_SYNC_INTERVAL_SECS";
pub const ENV_STALE_AFTER: &str = "CROSSNOTE_STALE_AFTER_SECS";

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    /// Built-in defaults (lowest priority)
    Defaults = 0,
    /// User-level config (`<config dir>/crossnote/config.yaml`)
    User = 1,
    /// File named by `--config` or `CROSSNOTE_CONFIG_PATH`
    Explicit = 2,
    /// Environment variables (highest priority)
    Environment = 3,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Explicit => write!(f, "explicit"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Paths for each file tier.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// User-level config directory
    pub user_dir: Option<PathBuf>,
    /// Explicit config file
    pub explicit_file: Option<PathBuf>,
}

impl ConfigPaths {
    /// Discover paths from the platform config dir and the environment.
    ///
    /// `explicit` (from the command line) wins over `CROSSNOTE_CONFIG_PATH`.
    pub fn discover(explicit: Option<PathBuf>) -> Self {
        let explicit_file = explicit.or_else(|| std::env::var(ENV_CONFIG_PATH).ok().map(PathBuf::from));
        Self {
            user_dir: app_config_dir(),
            explicit_file,
        }
    }

    pub fn with_dirs(user_dir: Option<PathBuf>, explicit_file: Option<PathBuf>) -> Self {
        Self {
            user_dir,
            explicit_file,
        }
    }
}

/// Configuration loader that handles tier-based merging.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    pub paths: ConfigPaths,
    config: Config,
    /// Files that contributed, lowest tier first.
    sources: Vec<(ConfigTier, PathBuf)>,
}

impl ConfigLoader {
    /// Load configuration from every tier, reading overrides from the process environment.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self> {
        Self::load_with(ConfigPaths::discover(explicit), |key| std::env::var(key).ok())
    }

    /// Load configuration with explicit paths and environment lookup.
    pub fn load_with<F>(paths: ConfigPaths, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut configs: Vec<Value> = Vec::new();
        let mut sources = Vec::new();

        // Tier 1: Defaults
        configs.push(serde_json::to_value(Config::default())?);

        // Tier 2: User config. A broken user file is reported and skipped.
        if let Some(ref user_dir) = paths.user_dir {
            let config_file = user_dir.join("config.yaml");
            if config_file.exists() {
                match read_yaml(&config_file) {
                    Ok(value) => {
                        configs.push(value);
                        sources.push((ConfigTier::User, config_file));
                    }
                    Err(e) => warn!(path = %config_file.display(), error = %e, "Ignoring user config"),
                }
            }
        }

        // Tier 3: Explicit file. Must exist and parse.
        if let Some(ref explicit) = paths.explicit_file {
            configs.push(read_yaml(explicit)?);
            sources.push((ConfigTier::Explicit, explicit.clone()));
        }

        let merged = deep_merge_all(configs);
        let mut config: Config = serde_json::from_value(merged).context("Invalid configuration")?;

        // Tier 4: Environment variable overrides
        Self::apply_env_overrides(&mut config, env)?;

        debug!(sources = ?sources, "Configuration loaded");
        Ok(Self {
            paths,
            config,
            sources,
        })
    }

    fn apply_env_overrides<F>(config: &mut Config, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db_path) = env(ENV_DB_PATH) {
            config.index.db_path = PathBuf::from(db_path);
        }

        if let Some(interval) = env(ENV_SYNC_INTERVAL) {
            config.sync.interval_secs = interval
                .trim()
                .parse()
                .with_context(|| format!("{ENV_SYNC_INTERVAL} must be a whole number of seconds"))?;
        }

        if let Some(stale) = env(ENV_STALE_AFTER) {
            let secs = stale
                .trim()
                .parse()
                .with_context(|| format!("{ENV_STALE_AFTER} must be a whole number of seconds"))?;
            config.sync.stale_after_secs = Some(secs);
        }

        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    /// Files that contributed to the loaded configuration.
    pub fn sources(&self) -> &[(ConfigTier, PathBuf)] {
        &self.sources
    }
}

fn read_yaml(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let value: Value = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config {}", path.display()))?;
    Ok(value)
}
