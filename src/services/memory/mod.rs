//! Memory Engine
//!
//! Durable conversational memory: every prompt/response turn with its
//! affective-state snapshot, searchable by text and by state similarity,
//! with high-value turns promoted into a training queue.
//!
//! ## Module Structure
//!
//! - `engine` - `MemoryEngine` with ingest, recall, recency, forget and stats
//! - `retrieval` - Full-text (BM25) and state-similarity search
//! - `graduation` - Candidate selection, shard records and training status
//! - `export` - Shard artifacts on disk and the promotion pass

pub mod engine;
pub mod export;
pub mod graduation;
pub mod retrieval;

pub use engine::MemoryEngine;
pub use export::ShardExporter;
pub use graduation::{SHARD_MIN_ACCESS, SHARD_MIN_QUALITY};
pub use retrieval::{SearchOutcome, STATE_SEARCH_WINDOW};
