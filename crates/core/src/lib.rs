//! Limpha Core
//!
//! The pure part of the Limpha memory engine: quality scoring, affective
//! state vectors and the shard training status. Nothing here touches
//! storage, so every function is testable in isolation.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `quality` - Prompt/response quality score in `[0, 1]`
//! - `affect` - `AffectState`, its 6-d projection and cosine distance
//! - `training` - `TrainingStatus` state machine

pub mod affect;
pub mod error;
pub mod quality;
pub mod training;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Affective State ────────────────────────────────────────────────────
pub use affect::{cosine_distance, AffectState, StateVector, STATE_DIMENSIONS};

// ── Training Lifecycle ─────────────────────────────────────────────────
pub use training::TrainingStatus;
