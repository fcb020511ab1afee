//! Utilities
//!
//! Error type and filesystem paths shared across the crate.

pub mod error;
pub mod paths;

pub use error::*;
pub use paths::*;
