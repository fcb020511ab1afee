//! Turn Models
//!
//! One prompt/response exchange with its affective-state snapshot, and the
//! ranked views returned by the retrieval paths.

use limpha_core::AffectState;
use serde::{Deserialize, Serialize};

/// A stored conversation turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Store-assigned identity, strictly increasing
    pub id: i64,
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    /// Session that produced this turn
    pub session_id: String,
    pub prompt: String,
    pub response: String,
    pub temperature: f64,
    pub destiny: f64,
    pub pain: f64,
    pub tension: f64,
    pub debt: f64,
    pub velocity: i64,
    pub alpha: f64,
    /// Quality score in `[0, 1]`, fixed at ingest
    pub quality: f64,
    /// Number of explicit recalls
    pub access_count: i64,
}

impl Turn {
    /// The affective state captured with this turn
    pub fn affect(&self) -> AffectState {
        AffectState {
            temperature: self.temperature,
            destiny: self.destiny,
            pain: self.pain,
            tension: self.tension,
            debt: self.debt,
            velocity: self.velocity,
            alpha: self.alpha,
        }
    }
}

/// Full-text search hit. Lower `rank` is more relevant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub turn: Turn,
    pub rank: f64,
}

/// State-similarity match. `distance` is cosine distance, `0.0` = identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMatch {
    #[serde(flatten)]
    pub turn: Turn,
    pub distance: f64,
}

/// Outcome of deleting a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForgetOutcome {
    /// Turn, index entry and session contribution removed
    Forgotten,
    /// No turn with that identity
    NotFound,
    /// Turn has a shard; graduation cannot be undone
    Graduated,
}
