//! SQLite Database
//!
//! Embedded database for persistent storage using rusqlite with r2d2 connection pooling.
//!
//! Every pooled connection runs in WAL mode so readers are never blocked
//! behind an in-flight write transaction. The `turns_fts` FTS5 index is an
//! external-content table over `turns`, kept in lockstep by triggers that
//! run inside the writing transaction.

use std::path::{Path, PathBuf};
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::{ensure_parent, wal_path};

/// Type alias for the connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// A connection checked out of the pool
pub type PooledConn = r2d2::PooledConnection<SqliteConnectionManager>;

/// Upper bound on waiting for the SQLite write lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on waiting for a free pooled connection
const POOL_TIMEOUT: Duration = Duration::from_secs(10);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS turns (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp REAL NOT NULL,
    session_id TEXT NOT NULL,
    prompt TEXT NOT NULL,
    response TEXT NOT NULL,
    temperature REAL NOT NULL DEFAULT 0.0,
    destiny REAL NOT NULL DEFAULT 0.0,
    pain REAL NOT NULL DEFAULT 0.0,
    tension REAL NOT NULL DEFAULT 0.0,
    debt REAL NOT NULL DEFAULT 0.0,
    velocity INTEGER NOT NULL DEFAULT 1,
    alpha REAL NOT NULL DEFAULT 0.0,
    quality REAL NOT NULL DEFAULT 0.0 CHECK (quality >= 0.0 AND quality <= 1.0),
    access_count INTEGER NOT NULL DEFAULT 0 CHECK (access_count >= 0)
);

CREATE INDEX IF NOT EXISTS idx_turns_timestamp ON turns(timestamp DESC);
CREATE INDEX IF NOT EXISTS idx_turns_session ON turns(session_id);
CREATE INDEX IF NOT EXISTS idx_turns_quality ON turns(quality DESC);

CREATE VIRTUAL TABLE IF NOT EXISTS turns_fts USING fts5(
    prompt,
    response,
    content=turns,
    content_rowid=id,
    tokenize='porter unicode61'
);

CREATE TRIGGER IF NOT EXISTS turns_fts_insert AFTER INSERT ON turns BEGIN
    INSERT INTO turns_fts(rowid, prompt, response)
    VALUES (new.id, new.prompt, new.response);
END;

CREATE TRIGGER IF NOT EXISTS turns_fts_delete AFTER DELETE ON turns BEGIN
    INSERT INTO turns_fts(turns_fts, rowid, prompt, response)
    VALUES ('delete', old.id, old.prompt, old.response);
END;

CREATE TRIGGER IF NOT EXISTS turns_fts_update AFTER UPDATE OF prompt, response ON turns BEGIN
    INSERT INTO turns_fts(turns_fts, rowid, prompt, response)
    VALUES ('delete', old.id, old.prompt, old.response);
    INSERT INTO turns_fts(rowid, prompt, response)
    VALUES (new.id, new.prompt, new.response);
END;

CREATE TABLE IF NOT EXISTS sessions (
    session_id TEXT PRIMARY KEY,
    started_at REAL NOT NULL,
    last_active REAL NOT NULL,
    turn_count INTEGER NOT NULL DEFAULT 0,
    avg_quality REAL NOT NULL DEFAULT 0.0
);

CREATE TABLE IF NOT EXISTS shards (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    turn_id INTEGER UNIQUE NOT NULL,
    shard_path TEXT NOT NULL,
    graduated_at REAL NOT NULL,
    reason TEXT NOT NULL DEFAULT '',
    priority REAL NOT NULL DEFAULT 0.0,
    training_status TEXT NOT NULL DEFAULT 'pending'
        CHECK (training_status IN ('pending', 'trained')),
    training_loss REAL,
    CHECK (training_status = 'trained' OR training_loss IS NULL),
    FOREIGN KEY (turn_id) REFERENCES turns(id)
);

CREATE INDEX IF NOT EXISTS idx_shards_status ON shards(training_status);
CREATE INDEX IF NOT EXISTS idx_shards_graduated ON shards(graduated_at DESC);
";

/// Per-connection setup run by the pool on every new connection.
fn configure_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    // In-memory databases answer "memory" here; that is fine.
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

/// Database service for managing SQLite operations
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// `None` for in-memory databases
    path: Option<PathBuf>,
}

impl Database {
    /// Create an in-memory database for testing.
    ///
    /// Uses a single pooled connection so every caller sees the same
    /// database. Callers must never hold two connections at once.
    pub fn new_in_memory() -> AppResult<Self> {
        let manager = SqliteConnectionManager::memory().with_init(configure_connection);
        let pool = Pool::builder()
            .max_size(1)
            // recycling the only connection would drop the database
            .idle_timeout(None)
            .max_lifetime(None)
            .connection_timeout(POOL_TIMEOUT)
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool, path: None };
        db.init_schema()?;
        Ok(db)
    }

    /// Open (creating if needed) the database file at `path`
    pub fn open(path: &Path, pool_size: u32) -> AppResult<Self> {
        ensure_parent(path)?;

        let manager = SqliteConnectionManager::file(path).with_init(configure_connection);
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .connection_timeout(POOL_TIMEOUT)
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))?;

        let db = Self {
            pool,
            path: Some(path.to_path_buf()),
        };
        db.init_schema()?;

        tracing::info!(path = %path.display(), pool_size, "Opened memory database");
        Ok(db)
    }

    /// Create tables, indexes, the FTS5 index and its sync triggers.
    ///
    /// Idempotent; safe to run on every startup.
    pub fn init_schema(&self) -> AppResult<()> {
        let conn = self.get_connection()?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get a connection from the pool
    pub fn get_connection(&self) -> AppResult<PooledConn> {
        self.pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))
    }

    /// Database file path, `None` when in memory
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Human-readable storage location
    pub fn location(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => ":memory:".to_string(),
        }
    }

    /// Bytes used on disk by the database file and its WAL sidecar
    pub fn size_on_disk(&self) -> AppResult<u64> {
        let Some(path) = &self.path else {
            return Ok(0);
        };

        let mut total = 0;
        for file in [path.clone(), wal_path(path)] {
            match std::fs::metadata(&file) {
                Ok(meta) => total += meta.len(),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(total)
    }

    /// Current journal mode as reported by SQLite
    pub fn journal_mode(&self) -> AppResult<String> {
        let conn = self.get_connection()?;
        let mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
        Ok(mode)
    }
}
