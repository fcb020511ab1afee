//! JSON Configuration Management
//!
//! Handles reading and writing the daemon configuration file.

use std::fs;
use std::path::{Path, PathBuf};

use crate::models::settings::LimphaConfig;
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::{config_path, ensure_parent};

/// Configuration service for the daemon settings file
#[derive(Debug)]
pub struct ConfigService {
    config_path: PathBuf,
    config: LimphaConfig,
}

impl ConfigService {
    /// Load the config at the default location, creating it with defaults if absent
    pub fn new() -> AppResult<Self> {
        let path = config_path()?;
        Self::load_or_create(&path, LimphaConfig::with_default_paths()?)
    }

    /// Load the config at `path`, writing `defaults` there if the file does not exist
    pub fn load_or_create(path: &Path, defaults: LimphaConfig) -> AppResult<Self> {
        let config = if path.exists() {
            Self::load_from_file(path)?
        } else {
            ensure_parent(path)?;
            Self::save_to_file(path, &defaults)?;
            defaults
        };

        Ok(Self {
            config_path: path.to_path_buf(),
            config,
        })
    }

    /// Load configuration from a file
    fn load_from_file(path: &Path) -> AppResult<LimphaConfig> {
        let content = fs::read_to_string(path)?;
        let config: LimphaConfig = serde_json::from_str(&content)?;
        config.validate().map_err(AppError::config)?;
        Ok(config)
    }

    /// Save configuration to a file with pretty formatting
    fn save_to_file(path: &Path, config: &LimphaConfig) -> AppResult<()> {
        config.validate().map_err(AppError::config)?;
        let content = serde_json::to_string_pretty(config)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the current configuration
    pub fn get_config(&self) -> &LimphaConfig {
        &self.config
    }

    /// Take ownership of the configuration
    pub fn into_config(self) -> LimphaConfig {
        self.config
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}
