//! Config file parsing for `~/.config/wpfleet/config.toml`.
//!
//! Use `executor_from_config` to build the default HTTP executor so the
//! configured base URL and timeout apply.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::{HttpExecutor, OperationExecutor, WithTimeout};
use crate::history::{FileHistory, HISTORY_LIMIT};
use crate::progress::SEED_PERCENT;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Optional per-request deadline. Unset means no client-side timeout.
    pub timeout_secs: Option<u64>,
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfig {
    #[serde(default = "default_seed_percent")]
    pub seed_percent: u8,
}

fn default_seed_percent() -> u8 {
    SEED_PERCENT
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            seed_percent: SEED_PERCENT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Override for the history file location.
    pub path: Option<String>,
    #[serde(default = "default_history_limit")]
    pub max_entries: usize,
}

fn default_history_limit() -> usize {
    HISTORY_LIMIT
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_entries: HISTORY_LIMIT,
        }
    }
}

/// Load config from the default path (`~/.config/wpfleet/config.toml`).
pub fn load_config() -> AppConfig {
    let config_path = match config_path() {
        Some(p) => p,
        None => return AppConfig::default(),
    };

    let content = match std::fs::read_to_string(&config_path) {
        Ok(c) => c,
        Err(_) => return AppConfig::default(),
    };

    match toml::from_str::<AppConfig>(&content) {
        Ok(cfg) => cfg,
        Err(_) => AppConfig::default(),
    }
}

/// Return the default config file path (for init and show).
pub fn config_path() -> Option<std::path::PathBuf> {
    dirs::config_dir().map(|mut p| {
        p.push("wpfleet");
        p.push("config.toml");
        p
    })
}

/// Build the default executor from config: HTTP against the configured base
/// URL, wrapped with a timeout when one is set.
pub fn executor_from_config(cfg: &AppConfig) -> Arc<dyn OperationExecutor> {
    let http = HttpExecutor::new(cfg.api.base_url.clone());
    match cfg.api.timeout_secs {
        Some(secs) => Arc::new(WithTimeout::new(http, Duration::from_secs(secs))),
        None => Arc::new(http),
    }
}

/// Build the history store from config. `None` when no usable path exists.
pub fn history_from_config(cfg: &HistoryConfig) -> Option<FileHistory> {
    let path = match &cfg.path {
        Some(p) => std::path::PathBuf::from(p),
        None => FileHistory::default_path()?,
    };
    Some(FileHistory::new(path).with_limit(cfg.max_entries))
}
