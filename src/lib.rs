//! Limpha - Durable Conversational Memory
//!
//! This library provides the memory layer for a conversational agent.
//! It includes:
//! - The memory engine (ingest, recall, text and state search, shard graduation)
//! - The Unix socket daemon that serves it
//! - Storage layer (SQLite, JSON config)
//! - Data models and utilities

pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

pub use limpha_core::{AffectState, TrainingStatus};
pub use models::*;
pub use services::memory::{
    MemoryEngine, SearchOutcome, ShardExporter, SHARD_MIN_ACCESS, SHARD_MIN_QUALITY,
};
pub use storage::{ConfigService, Database};
pub use utils::error::{AppError, AppResult};
