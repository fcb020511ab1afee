//! Shard Models
//!
//! Promotion records linking a turn to a training artifact.

use limpha_core::TrainingStatus;
use serde::{Deserialize, Serialize};

/// A graduated turn destined for training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shard {
    pub id: i64,
    /// The graduated turn; at most one shard per turn
    pub turn_id: i64,
    /// Location of the training artifact
    pub shard_path: String,
    /// Seconds since the Unix epoch
    pub graduated_at: f64,
    pub reason: String,
    /// Higher trains first
    pub priority: f64,
    pub training_status: TrainingStatus,
    /// Only present once trained
    pub training_loss: Option<f64>,
}

/// Pending shard joined with its turn's text, as served to the trainer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    #[serde(flatten)]
    pub shard: Shard,
    pub prompt: String,
    pub response: String,
    pub quality: f64,
}

/// Outcome of a graduation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraduationOutcome {
    /// A new shard was recorded
    Graduated(i64),
    /// The turn already has a shard; nothing changed
    AlreadyGraduated,
}

impl GraduationOutcome {
    /// The new shard id, if one was created
    pub fn shard_id(&self) -> Option<i64> {
        match self {
            GraduationOutcome::Graduated(id) => Some(*id),
            GraduationOutcome::AlreadyGraduated => None,
        }
    }
}

/// Training pair written to shard artifacts, one JSON object per line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingPair {
    pub prompt: String,
    pub response: String,
}

/// Summary of one autonomous promotion pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromotionReport {
    /// Candidates examined
    pub considered: usize,
    /// (turn_id, shard_id) for every new shard
    pub graduated: Vec<(i64, i64)>,
    /// Turns that raced with another graduation
    pub already_graduated: Vec<i64>,
}
