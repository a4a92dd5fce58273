//! Board configuration, read from `config.toml`

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::task_store::DEFAULT_STORAGE_KEY;

const APP_DIR: &str = "taskboard";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the task file; defaults to the platform data dir
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub board: BoardConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Ask before deleting a task
    #[serde(default = "default_true")]
    pub confirm_delete: bool,
}

fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.to_string()
}

fn default_timeout_ms() -> u64 {
    3000
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            storage_key: default_storage_key(),
            notifications: NotificationConfig::default(),
            board: BoardConfig::default(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            confirm_delete: true,
        }
    }
}

impl Config {
    /// Resolved data directory, if one can be determined on this platform
    pub fn data_dir(&self) -> Option<PathBuf> {
        self.data_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join(APP_DIR)))
    }

    pub fn notification_timeout(&self) -> Duration {
        Duration::from_millis(self.notifications.timeout_ms)
    }
}

/// Default config file location: `<config_dir>/taskboard/config.toml`
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
}

/// Load configuration. A missing file means defaults.
///
/// Runs before logging is set up, so failures are returned for the caller to report.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path.map(Path::to_path_buf).or_else(config_path) {
        Some(path) => path,
        None => return Ok(Config::default()),
    };

    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(source) => return Err(ConfigError::Read { path, source }),
    };
    parse_config(&content).map_err(|source| ConfigError::Parse { path, source })
}

pub fn parse_config(content: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(content)
}
