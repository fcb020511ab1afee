//! Memory Retrieval
//!
//! Two independent retrieval paths over stored turns:
//!
//! 1. Full-text search through the FTS5 index, ranked by BM25
//!    (lower rank = more relevant).
//! 2. State-similarity search: cosine distance between a query affect
//!    vector and each recent turn's state vector, best first.
//!
//! Neither path touches access counters; only explicit recall does.

use limpha_core::{cosine_distance, AffectState};
use rusqlite::{params, ErrorCode};
use serde::{Deserialize, Serialize};

use crate::models::turn::{SearchHit, StateMatch, Turn};
use crate::services::memory::engine::{row_to_turn, MemoryEngine, TURN_COLUMNS};
use crate::utils::error::AppResult;

/// Number of most recent turns scanned by state search
pub const STATE_SEARCH_WINDOW: usize = 1000;

/// Result of a full-text query.
///
/// A query the index cannot parse is not an error; it is reported
/// distinctly so callers can tell "no matches" from "bad syntax".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SearchOutcome {
    Hits(Vec<SearchHit>),
    Malformed(String),
}

impl SearchOutcome {
    /// Hits, treating a malformed query as matching nothing
    pub fn into_hits(self) -> Vec<SearchHit> {
        match self {
            SearchOutcome::Hits(hits) => hits,
            SearchOutcome::Malformed(_) => Vec::new(),
        }
    }
}

impl MemoryEngine {
    /// Full-text search; malformed queries yield an empty list.
    pub fn search(&self, query: &str, limit: usize) -> AppResult<Vec<SearchHit>> {
        Ok(self.search_checked(query, limit)?.into_hits())
    }

    /// Full-text search that reports malformed query syntax.
    ///
    /// The query uses the FTS5 match language (terms, phrases, boolean
    /// operators, prefix `*`, column filters). Blank queries match nothing.
    pub fn search_checked(&self, query: &str, limit: usize) -> AppResult<SearchOutcome> {
        if query.trim().is_empty() || limit == 0 {
            return Ok(SearchOutcome::Hits(Vec::new()));
        }

        let conn = self.database().get_connection()?;
        // prepare failures are storage faults; the match expression is only
        // parsed once the statement steps
        let mut stmt = conn.prepare(
            "SELECT t.*, bm25(turns_fts) AS rank
             FROM turns_fts
             JOIN turns t ON t.id = turns_fts.rowid
             WHERE turns_fts MATCH ?1
             ORDER BY rank
             LIMIT ?2",
        )?;
        let result = stmt
            .query_map(params![query, limit as i64], |row| {
                Ok(SearchHit {
                    turn: row_to_turn(row)?,
                    rank: row.get("rank")?,
                })
            })
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>());

        match result {
            Ok(hits) => Ok(SearchOutcome::Hits(hits)),
            Err(e) if is_malformed_query(&e) => {
                tracing::warn!(query, error = %e, "Malformed full-text query");
                Ok(SearchOutcome::Malformed(e.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Turns whose stored state is closest to `state`.
    ///
    /// Scans the most recent `STATE_SEARCH_WINDOW` turns with quality at
    /// least `min_quality`. Equal distances keep recency order.
    pub fn search_by_state(
        &self,
        state: &AffectState,
        top_k: usize,
        min_quality: f64,
    ) -> AppResult<Vec<StateMatch>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        state.validate()?;

        let candidates = self.recent_above_quality(min_quality, STATE_SEARCH_WINDOW)?;
        let query = state.to_vector();

        let mut matches: Vec<StateMatch> = candidates
            .into_iter()
            .map(|turn| {
                let distance = cosine_distance(&query, &turn.affect().to_vector());
                StateMatch { turn, distance }
            })
            .collect();

        // sort_by is stable, so ties stay newest first
        matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        matches.truncate(top_k);

        Ok(matches)
    }

    /// Newest-first turns at or above a quality floor
    fn recent_above_quality(&self, min_quality: f64, window: usize) -> AppResult<Vec<Turn>> {
        let conn = self.database().get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM turns
             WHERE quality >= ?1
             ORDER BY timestamp DESC, id DESC
             LIMIT ?2",
            TURN_COLUMNS
        ))?;
        let rows = stmt.query_map(params![min_quality, window as i64], row_to_turn)?;
        let turns = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(turns)
    }
}

/// Messages FTS5 raises for a match expression it cannot parse
const MALFORMED_QUERY_MESSAGES: &[&str] = &["fts5:", "no such column", "unterminated string"];

/// FTS5 reports syntax problems (and unknown columns in filters) as a
/// plain SQLITE_ERROR; only its parser messages count as malformed.
fn is_malformed_query(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(message)) if e.code == ErrorCode::Unknown => {
            MALFORMED_QUERY_MESSAGES
                .iter()
                .any(|prefix| message.starts_with(prefix))
        }
        _ => false,
    }
}
