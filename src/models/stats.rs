//! Statistics Models

use serde::{Deserialize, Serialize};

/// Store-wide counters reported by the `stats` command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_conversations: i64,
    pub total_shards: i64,
    pub total_sessions: i64,
    pub pending_training: i64,
    /// Session of the reporting engine instance
    pub current_session: String,
    pub db_path: String,
    /// Database file plus its WAL sidecar
    pub db_size_bytes: u64,
}
