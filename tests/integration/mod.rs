//! Integration Tests Module
//!
//! End-to-end tests for Limpha against real SQLite databases:
//! on-disk persistence and concurrent ingest, the graduation lifecycle,
//! and the socket daemon round trip.

// Engine persistence, concurrency and retrieval tests
mod engine_test;

// Candidate selection, graduation and training queue tests
mod graduation_test;

// Unix socket daemon tests
mod daemon_test;
