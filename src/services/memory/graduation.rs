//! Shard Graduation
//!
//! A turn that proved valuable (high quality, recalled repeatedly) can be
//! promoted into a shard: a record pointing at a training artifact. Shards
//! start `pending` and move once to `trained`.
//!
//! The UNIQUE constraint on `shards.turn_id` is the only graduation guard.
//! Candidate listing is advisory; two concurrent promoters that pick the
//! same turn both attempt the insert and exactly one wins.

use limpha_core::TrainingStatus;
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};

use crate::models::shard::{GraduationOutcome, QueueEntry, Shard};
use crate::models::turn::Turn;
use crate::services::memory::engine::{now_secs, row_to_turn, MemoryEngine};
use crate::utils::error::{AppError, AppResult};

/// Minimum quality for a turn to be a graduation candidate
pub const SHARD_MIN_QUALITY: f64 = 0.7;

/// Minimum number of recalls for a turn to be a graduation candidate
pub const SHARD_MIN_ACCESS: i64 = 3;

const SHARD_COLUMNS: &str = "s.id, s.turn_id, s.shard_path, s.graduated_at, s.reason, \
     s.priority, s.training_status, s.training_loss";

impl MemoryEngine {
    /// Ungraduated turns meeting both candidate thresholds, best first.
    pub fn find_candidates(&self, limit: usize) -> AppResult<Vec<Turn>> {
        let conn = self.database().get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT t.* FROM turns t
             LEFT JOIN shards s ON s.turn_id = t.id
             WHERE s.id IS NULL
               AND t.quality >= ?1
               AND t.access_count >= ?2
             ORDER BY t.quality DESC, t.access_count DESC, t.id ASC
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(
            params![SHARD_MIN_QUALITY, SHARD_MIN_ACCESS, limit as i64],
            row_to_turn,
        )?;
        let turns = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(turns)
    }

    /// Record a shard for `turn_id`.
    ///
    /// Graduating a turn that already has a shard changes nothing and
    /// reports `AlreadyGraduated`. Graduating an unknown turn is `NotFound`.
    pub fn graduate(
        &self,
        turn_id: i64,
        shard_path: &str,
        reason: &str,
        priority: f64,
    ) -> AppResult<GraduationOutcome> {
        if !priority.is_finite() {
            return Err(AppError::validation(format!(
                "priority must be a finite number, got {}",
                priority
            )));
        }

        let conn = self.database().get_connection()?;
        let inserted = conn.execute(
            "INSERT INTO shards (turn_id, shard_path, graduated_at, reason, priority)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![turn_id, shard_path, now_secs(), reason, priority],
        );

        match inserted {
            Ok(_) => {
                let shard_id = conn.last_insert_rowid();
                tracing::info!(turn_id, shard_id, reason, "Graduated turn to shard");
                Ok(GraduationOutcome::Graduated(shard_id))
            }
            Err(e) if is_constraint(&e, rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE) => {
                tracing::debug!(turn_id, "Turn already graduated");
                Ok(GraduationOutcome::AlreadyGraduated)
            }
            Err(e) if is_constraint(&e, rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => Err(
                AppError::not_found(format!("Turn not found: {}", turn_id)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    /// Shard by id
    pub fn get_shard(&self, shard_id: i64) -> AppResult<Option<Shard>> {
        let conn = self.database().get_connection()?;
        let shard = conn
            .query_row(
                &format!("SELECT {} FROM shards s WHERE s.id = ?1", SHARD_COLUMNS),
                params![shard_id],
                row_to_shard,
            )
            .optional()?;
        Ok(shard)
    }

    /// Shard recorded for a turn, if graduated
    pub fn shard_for_turn(&self, turn_id: i64) -> AppResult<Option<Shard>> {
        let conn = self.database().get_connection()?;
        let shard = conn
            .query_row(
                &format!("SELECT {} FROM shards s WHERE s.turn_id = ?1", SHARD_COLUMNS),
                params![turn_id],
                row_to_shard,
            )
            .optional()?;
        Ok(shard)
    }

    /// Pending shards with their turn text.
    ///
    /// Highest priority first, then oldest graduation first.
    pub fn training_queue(&self, limit: usize) -> AppResult<Vec<QueueEntry>> {
        let conn = self.database().get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {}, t.prompt, t.response, t.quality
             FROM shards s
             JOIN turns t ON t.id = s.turn_id
             WHERE s.training_status = 'pending'
             ORDER BY s.priority DESC, s.graduated_at ASC, s.id ASC
             LIMIT ?1",
            SHARD_COLUMNS
        ))?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(QueueEntry {
                shard: row_to_shard(row)?,
                prompt: row.get("prompt")?,
                response: row.get("response")?,
                quality: row.get("quality")?,
            })
        })?;
        let entries = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Mark a pending shard trained, recording its loss.
    ///
    /// Returns `false` without touching the row if the shard was already
    /// trained, so a first recorded loss is never overwritten.
    pub fn mark_trained(&self, shard_id: i64, loss: Option<f64>) -> AppResult<bool> {
        if let Some(loss) = loss {
            if !loss.is_finite() {
                return Err(AppError::validation(format!(
                    "loss must be a finite number, got {}",
                    loss
                )));
            }
        }

        let mut conn = self.database().get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let status: Option<String> = tx
            .query_row(
                "SELECT training_status FROM shards WHERE id = ?1",
                params![shard_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(status) = status else {
            return Err(AppError::not_found(format!("Shard not found: {}", shard_id)));
        };

        let status = TrainingStatus::parse(&status)?;
        if !status.can_transition_to(TrainingStatus::Trained) {
            tracing::debug!(shard_id, %status, "Shard already trained");
            return Ok(false);
        }

        tx.execute(
            "UPDATE shards SET training_status = ?1, training_loss = ?2 WHERE id = ?3",
            params![TrainingStatus::Trained.as_str(), loss, shard_id],
        )?;
        tx.commit()?;

        tracing::info!(shard_id, ?loss, "Shard marked trained");
        Ok(true)
    }
}

/// Map a row carrying the `SHARD_COLUMNS` into a `Shard`
fn row_to_shard(row: &Row) -> rusqlite::Result<Shard> {
    let status: String = row.get("training_status")?;
    let training_status = TrainingStatus::parse(&status)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;

    Ok(Shard {
        id: row.get("id")?,
        turn_id: row.get("turn_id")?,
        shard_path: row.get("shard_path")?,
        graduated_at: row.get("graduated_at")?,
        reason: row.get("reason")?,
        priority: row.get("priority")?,
        training_status,
        training_loss: row.get("training_loss")?,
    })
}

fn is_constraint(err: &rusqlite::Error, extended_code: std::os::raw::c_int) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.extended_code == extended_code)
}
