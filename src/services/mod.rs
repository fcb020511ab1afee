//! Services
//!
//! Business logic: the memory engine and the daemon that serves it.

#[cfg(unix)]
pub mod daemon;
pub mod memory;

pub use memory::{MemoryEngine, SearchOutcome, ShardExporter};
