//! Session Models
//!
//! A session is the run of turns produced by one engine instance.

use serde::{Deserialize, Serialize};

/// Length of a generated session identifier
const SESSION_ID_LEN: usize = 8;

/// Identity of the session an engine instance writes into.
///
/// Passed explicitly to `MemoryEngine::open` so independent engines never
/// share ambient session state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionHandle {
    id: String,
}

impl SessionHandle {
    /// Use a caller-chosen session identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Generate a fresh short identifier from a v4 UUID
    pub fn generate() -> Self {
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        Self {
            id: uuid[..SESSION_ID_LEN].to_string(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl std::fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Aggregate row for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    /// Seconds since the Unix epoch
    pub started_at: f64,
    /// Seconds since the Unix epoch of the latest ingest
    pub last_active: f64,
    /// Number of turns stored under this session
    pub turn_count: i64,
    /// Running mean of turn quality
    pub avg_quality: f64,
}
