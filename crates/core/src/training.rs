//! Training Status
//!
//! Lifecycle of a graduated shard. The only transition is
//! `Pending -> Trained`.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Training status of a shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStatus {
    Pending,
    Trained,
}

impl TrainingStatus {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingStatus::Pending => "pending",
            TrainingStatus::Trained => "trained",
        }
    }

    /// Parse from database string representation
    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "pending" => Ok(TrainingStatus::Pending),
            "trained" => Ok(TrainingStatus::Trained),
            _ => Err(CoreError::parse(format!("Invalid training status: {}", s))),
        }
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(&self, next: TrainingStatus) -> bool {
        matches!(
            (self, next),
            (TrainingStatus::Pending, TrainingStatus::Trained)
        )
    }
}

impl std::fmt::Display for TrainingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
