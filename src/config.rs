// ⚙️ Configuration - layered with figment
//
// Sources, highest priority first:
//   1. Environment variables (`GESTAUDIT_*`, `__` separates sections)
//   2. `gestaudit.toml` in the working directory
//   3. Built-in defaults
//
// `GESTAUDIT_DATABASE__PATH=/tmp/a.db` -> `database.path`

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE: &str = "gestaudit.toml";
pub const ENV_PREFIX: &str = "GESTAUDIT_";

/// Longest accepted deadline window (ten years).
pub const MAX_DEADLINE_WINDOW_DAYS: i64 = 3650;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Figment(#[from] figment::Error),

    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: PathBuf::from("gestaudit.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DashboardConfig {
    /// Days ahead for a recommendation deadline to count as near
    pub deadline_window_days: i64,
    /// Max entries in the upcoming-audit and near-deadline lists
    pub list_limit: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            deadline_window_days: 30,
            list_limit: 5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

impl AppConfig {
    /// Load from defaults, `gestaudit.toml` and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// Same as [`load`](Self::load) but with an explicit config file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let figment = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::from_figment(figment)
    }

    /// The provider chain, public so tests can layer more providers on top.
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            figment = figment.merge(Toml::file(local));
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: AppConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "database.path".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        let window = self.dashboard.deadline_window_days;
        if !(0..=MAX_DEADLINE_WINDOW_DAYS).contains(&window) {
            return Err(ConfigError::InvalidValue {
                field: "dashboard.deadline_window_days".to_string(),
                reason: format!("must be between 0 and {} (got {})", MAX_DEADLINE_WINDOW_DAYS, window),
            });
        }
        if self.dashboard.list_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "dashboard.list_limit".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
