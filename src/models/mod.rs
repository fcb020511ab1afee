//! Data Models
//!
//! Contains all data structures used throughout the crate.

pub mod session;
pub mod settings;
pub mod shard;
pub mod stats;
pub mod turn;

pub use session::*;
pub use settings::*;
pub use shard::*;
pub use stats::*;
pub use turn::*;
