//! Memory Engine
//!
//! Owns the turn, session and shard tables. This module holds the ingest
//! pipeline (score, insert, index, aggregate) and the direct turn accessors;
//! search lives in `retrieval` and the shard lifecycle in `graduation`.
//!
//! Every write runs in an IMMEDIATE transaction, so concurrent writers
//! serialize on the SQLite write lock and each caller observes its own
//! commit before the call returns.

use limpha_core::{quality, AffectState};
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};

use crate::models::session::{Session, SessionHandle};
use crate::models::stats::MemoryStats;
use crate::models::turn::{ForgetOutcome, Turn};
use crate::storage::database::Database;
use crate::utils::error::AppResult;

/// Column list matching `row_to_turn`
pub(crate) const TURN_COLUMNS: &str = "id, timestamp, session_id, prompt, response, \
     temperature, destiny, pain, tension, debt, velocity, alpha, quality, access_count";

/// The memory engine bound to one session
pub struct MemoryEngine {
    db: Database,
    session: SessionHandle,
}

impl MemoryEngine {
    /// Initialize the schema and register `session` (idempotent).
    pub fn open(db: Database, session: SessionHandle) -> AppResult<Self> {
        db.init_schema()?;

        let now = now_secs();
        {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT OR IGNORE INTO sessions (session_id, started_at, last_active)
                 VALUES (?1, ?2, ?2)",
                params![session.id(), now],
            )?;
        } // connection released here

        tracing::info!(
            session = %session,
            location = %db.location(),
            "Memory engine ready"
        );
        Ok(Self { db, session })
    }

    /// The session this engine writes into
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// The underlying database
    pub fn database(&self) -> &Database {
        &self.db
    }

    // ========================================================================
    // Ingest
    // ========================================================================

    /// Store one turn and return its identity.
    ///
    /// Missing state defaults to zero scalars and velocity 1. Quality is
    /// scored here, once. The turn row, its index entry and the session
    /// aggregate commit together.
    pub fn store(
        &self,
        prompt: &str,
        response: &str,
        state: Option<&AffectState>,
    ) -> AppResult<i64> {
        let state = state.copied().unwrap_or_default();
        state.validate()?;

        let quality = quality::score(prompt, response);

        let mut conn = self.db.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        // read under the write lock so timestamp order follows id order
        let now = now_secs();

        tx.execute(
            "INSERT INTO turns
             (timestamp, session_id, prompt, response,
              temperature, destiny, pain, tension, debt, velocity, alpha, quality)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                now,
                self.session.id(),
                prompt,
                response,
                state.temperature,
                state.destiny,
                state.pain,
                state.tension,
                state.debt,
                state.velocity,
                state.alpha,
                quality,
            ],
        )?;
        let id = tx.last_insert_rowid();

        tx.execute(
            "INSERT OR IGNORE INTO sessions (session_id, started_at, last_active)
             VALUES (?1, ?2, ?2)",
            params![self.session.id(), now],
        )?;
        // SQLite evaluates every SET expression against the pre-update row,
        // so the mean uses the pre-increment count.
        tx.execute(
            "UPDATE sessions SET
                last_active = ?1,
                turn_count = turn_count + 1,
                avg_quality = (avg_quality * turn_count + ?2) / (turn_count + 1)
             WHERE session_id = ?3",
            params![now, quality, self.session.id()],
        )?;

        tx.commit()?;

        tracing::debug!(id, quality, session = %self.session, "Stored turn");
        Ok(id)
    }

    // ========================================================================
    // Read Operations
    // ========================================================================

    /// Recall a turn, incrementing its access count.
    ///
    /// Returns the post-increment row, or `None` if the id does not exist.
    pub fn recall(&self, id: i64) -> AppResult<Option<Turn>> {
        let mut conn = self.db.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let updated = tx.execute(
            "UPDATE turns SET access_count = access_count + 1 WHERE id = ?1",
            params![id],
        )?;
        if updated == 0 {
            return Ok(None);
        }

        let turn = tx.query_row(
            &format!("SELECT {} FROM turns WHERE id = ?1", TURN_COLUMNS),
            params![id],
            row_to_turn,
        )?;
        tx.commit()?;

        tracing::debug!(id, access_count = turn.access_count, "Recalled turn");
        Ok(Some(turn))
    }

    /// Read a turn without counting it as a recall
    pub fn get_turn(&self, id: i64) -> AppResult<Option<Turn>> {
        let conn = self.db.get_connection()?;
        let turn = conn
            .query_row(
                &format!("SELECT {} FROM turns WHERE id = ?1", TURN_COLUMNS),
                params![id],
                row_to_turn,
            )
            .optional()?;
        Ok(turn)
    }

    /// The `limit` most recent turns, returned oldest first.
    ///
    /// With `session_id`, only turns from that session are considered.
    pub fn recent(&self, limit: usize, session_id: Option<&str>) -> AppResult<Vec<Turn>> {
        let conn = self.db.get_connection()?;

        let mut turns = match session_id {
            Some(session_id) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM turns
                     WHERE session_id = ?1
                     ORDER BY timestamp DESC, id DESC
                     LIMIT ?2",
                    TURN_COLUMNS
                ))?;
                let rows = stmt.query_map(params![session_id, limit as i64], row_to_turn)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM turns
                     ORDER BY timestamp DESC, id DESC
                     LIMIT ?1",
                    TURN_COLUMNS
                ))?;
                let rows = stmt.query_map(params![limit as i64], row_to_turn)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };

        // Chronological order for presentation
        turns.reverse();
        Ok(turns)
    }

    /// Session aggregate by id
    pub fn session_summary(&self, session_id: &str) -> AppResult<Option<Session>> {
        let conn = self.db.get_connection()?;
        let session = conn
            .query_row(
                "SELECT session_id, started_at, last_active, turn_count, avg_quality
                 FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| {
                    Ok(Session {
                        session_id: row.get(0)?,
                        started_at: row.get(1)?,
                        last_active: row.get(2)?,
                        turn_count: row.get(3)?,
                        avg_quality: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(session)
    }

    /// Store-wide counters
    pub fn stats(&self) -> AppResult<MemoryStats> {
        let (total_conversations, total_shards, total_sessions, pending_training) = {
            let conn = self.db.get_connection()?;
            let count = |sql: &str| -> rusqlite::Result<i64> { conn.query_row(sql, [], |row| row.get(0)) };
            (
                count("SELECT COUNT(*) FROM turns")?,
                count("SELECT COUNT(*) FROM shards")?,
                count("SELECT COUNT(*) FROM sessions")?,
                count("SELECT COUNT(*) FROM shards WHERE training_status = 'pending'")?,
            )
        };

        Ok(MemoryStats {
            total_conversations,
            total_shards,
            total_sessions,
            pending_training,
            current_session: self.session.id().to_string(),
            db_path: self.db.location(),
            db_size_bytes: self.db.size_on_disk()?,
        })
    }

    // ========================================================================
    // Delete Operations
    // ========================================================================

    /// Delete an ungraduated turn.
    ///
    /// The index trigger removes its text entry and the owning session's
    /// count and mean are rolled back, all in one transaction.
    pub fn forget(&self, id: i64) -> AppResult<ForgetOutcome> {
        let mut conn = self.db.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let found: Option<(String, f64)> = tx
            .query_row(
                "SELECT session_id, quality FROM turns WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((session_id, quality)) = found else {
            return Ok(ForgetOutcome::NotFound);
        };

        let graduated: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM shards WHERE turn_id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        if graduated {
            return Ok(ForgetOutcome::Graduated);
        }

        tx.execute("DELETE FROM turns WHERE id = ?1", params![id])?;
        tx.execute(
            "UPDATE sessions SET
                turn_count = turn_count - 1,
                avg_quality = CASE
                    WHEN turn_count <= 1 THEN 0.0
                    ELSE (avg_quality * turn_count - ?1) / (turn_count - 1)
                END
             WHERE session_id = ?2 AND turn_count > 0",
            params![quality, session_id],
        )?;

        tx.commit()?;

        tracing::info!(id, session = %session_id, "Forgot turn");
        Ok(ForgetOutcome::Forgotten)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Map a row carrying the `turns` columns (by name) into a `Turn`
pub(crate) fn row_to_turn(row: &Row) -> rusqlite::Result<Turn> {
    Ok(Turn {
        id: row.get("id")?,
        timestamp: row.get("timestamp")?,
        session_id: row.get("session_id")?,
        prompt: row.get("prompt")?,
        response: row.get("response")?,
        temperature: row.get("temperature")?,
        destiny: row.get("destiny")?,
        pain: row.get("pain")?,
        tension: row.get("tension")?,
        debt: row.get("debt")?,
        velocity: row.get("velocity")?,
        alpha: row.get("alpha")?,
        quality: row.get("quality")?,
        access_count: row.get("access_count")?,
    })
}

/// Current time in fractional seconds since the Unix epoch
pub(crate) fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
