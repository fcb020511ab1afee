//! Settings Models
//!
//! Daemon configuration stored in limpha.json.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::utils::error::AppResult;
use crate::utils::paths;

/// Largest connection pool the daemon will open
pub const MAX_POOL_SIZE: u32 = 64;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Daemon configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimphaConfig {
    /// SQLite database file
    pub db_path: PathBuf,
    /// Unix socket the daemon listens on
    pub socket_path: PathBuf,
    /// Directory for shard training artifacts
    pub shard_dir: PathBuf,
    /// Number of pooled SQLite connections
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    /// Log level: trace, debug, info, warn or error
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_pool_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LimphaConfig {
    /// Configuration rooted at the default `~/.yent/` locations
    pub fn with_default_paths() -> AppResult<Self> {
        Ok(Self {
            db_path: paths::database_path()?,
            socket_path: paths::socket_path()?,
            shard_dir: paths::shard_dir()?,
            pool_size: default_pool_size(),
            log_level: default_log_level(),
        })
    }

    /// Configuration with every file placed inside `dir`
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            db_path: dir.join("limpha.db"),
            socket_path: dir.join("limpha.sock"),
            shard_dir: dir.join("shards"),
            pool_size: default_pool_size(),
            log_level: default_log_level(),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.db_path.as_os_str().is_empty() {
            return Err("db_path must not be empty".to_string());
        }

        if self.socket_path.as_os_str().is_empty() {
            return Err("socket_path must not be empty".to_string());
        }

        if self.shard_dir.as_os_str().is_empty() {
            return Err("shard_dir must not be empty".to_string());
        }

        if self.pool_size == 0 || self.pool_size > MAX_POOL_SIZE {
            return Err(format!(
                "pool_size must be between 1 and {}, got {}",
                MAX_POOL_SIZE, self.pool_size
            ));
        }

        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level: {}. Must be one of {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            ));
        }

        Ok(())
    }
}
