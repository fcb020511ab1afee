//! Memory Daemon
//!
//! Exposes the memory engine over a local Unix socket using line-delimited
//! JSON requests and responses.

pub mod handlers;
pub mod protocol;
pub mod server;

pub use handlers::{dispatch, DaemonContext};
pub use protocol::{decode_request, Request, Response};
pub use server::MemoryDaemon;
