//! Filesystem Paths
//!
//! Default locations for the memory database, daemon socket, shard
//! artifacts and config file. Everything lives under `~/.yent/`.

use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

/// Get the user's home directory
pub fn home_dir() -> AppResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| AppError::config("Could not determine home directory"))
}

/// Get the data directory (~/.yent/)
pub fn limpha_dir() -> AppResult<PathBuf> {
    Ok(home_dir()?.join(".yent"))
}

/// Get the database file path (~/.yent/limpha.db)
pub fn database_path() -> AppResult<PathBuf> {
    Ok(limpha_dir()?.join("limpha.db"))
}

/// Get the daemon socket path (~/.yent/limpha.sock)
pub fn socket_path() -> AppResult<PathBuf> {
    Ok(limpha_dir()?.join("limpha.sock"))
}

/// Get the shard artifact directory (~/.yent/shards/)
pub fn shard_dir() -> AppResult<PathBuf> {
    Ok(limpha_dir()?.join("shards"))
}

/// Get the config file path (~/.yent/limpha.json)
pub fn config_path() -> AppResult<PathBuf> {
    Ok(limpha_dir()?.join("limpha.json"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Ensure the parent directory of a file path exists
pub fn ensure_parent(path: &Path) -> AppResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}

/// Path of the write-ahead-log sidecar for a database file
pub fn wal_path(db_path: &Path) -> PathBuf {
    let mut name = db_path.as_os_str().to_owned();
    name.push("-wal");
    PathBuf::from(name)
}
