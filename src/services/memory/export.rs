//! Shard Artifacts
//!
//! Writes graduated turns to disk in the trainer's JSONL format, one
//! `{"prompt": .., "response": ..}` object per line, and drives the
//! autonomous promotion pass: candidates -> artifact -> graduation.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::models::shard::{GraduationOutcome, PromotionReport, TrainingPair};
use crate::models::turn::Turn;
use crate::services::memory::engine::MemoryEngine;
use crate::utils::error::AppResult;
use crate::utils::paths::{ensure_dir, ensure_parent};

/// Writes shard artifacts into a single directory
#[derive(Debug, Clone)]
pub struct ShardExporter {
    shard_dir: PathBuf,
}

impl ShardExporter {
    pub fn new(shard_dir: impl Into<PathBuf>) -> Self {
        Self {
            shard_dir: shard_dir.into(),
        }
    }

    pub fn shard_dir(&self) -> &Path {
        &self.shard_dir
    }

    /// Artifact location for a turn
    pub fn artifact_path(&self, turn_id: i64) -> PathBuf {
        self.shard_dir.join(format!("shard_{}.jsonl", turn_id))
    }

    /// Write the training pair for `turn` and return the artifact path.
    ///
    /// The file is written next to its final name and renamed into place,
    /// so a reader never sees a partial artifact.
    pub fn write_artifact(&self, turn: &Turn) -> AppResult<PathBuf> {
        ensure_dir(&self.shard_dir)?;

        let path = self.artifact_path(turn.id);
        let staging = path.with_extension("jsonl.tmp");

        let pair = TrainingPair {
            prompt: turn.prompt.clone(),
            response: turn.response.clone(),
        };
        let mut line = serde_json::to_string(&pair)?;
        line.push('\n');

        fs::write(&staging, line)?;
        fs::rename(&staging, &path)?;

        tracing::debug!(turn_id = turn.id, path = %path.display(), "Wrote shard artifact");
        Ok(path)
    }

    /// Graduate up to `limit` current candidates.
    ///
    /// Each shard is recorded with reason `quality=<q>, access=<n>` and the
    /// turn's quality as priority. A candidate graduated concurrently by
    /// another caller is reported, not treated as a failure.
    pub fn promote_candidates(
        &self,
        engine: &MemoryEngine,
        limit: usize,
    ) -> AppResult<PromotionReport> {
        let candidates = engine.find_candidates(limit)?;
        let mut report = PromotionReport {
            considered: candidates.len(),
            ..Default::default()
        };

        for turn in candidates {
            let path = self.write_artifact(&turn)?;
            let reason = promotion_reason(&turn);

            match engine.graduate(turn.id, &path.to_string_lossy(), &reason, turn.quality)? {
                GraduationOutcome::Graduated(shard_id) => {
                    report.graduated.push((turn.id, shard_id));
                }
                GraduationOutcome::AlreadyGraduated => {
                    tracing::warn!(turn_id = turn.id, "Skipped promotion: already graduated");
                    report.already_graduated.push(turn.id);
                }
            }
        }

        tracing::info!(
            considered = report.considered,
            graduated = report.graduated.len(),
            "Promotion pass complete"
        );
        Ok(report)
    }

    /// Write up to `limit` pending queue entries to `output` as JSONL,
    /// in queue order. Returns the number of pairs written.
    pub fn export_training_queue(
        &self,
        engine: &MemoryEngine,
        output: &Path,
        limit: usize,
    ) -> AppResult<usize> {
        let queue = engine.training_queue(limit)?;
        ensure_parent(output)?;

        let mut writer = BufWriter::new(fs::File::create(output)?);
        for entry in &queue {
            let pair = TrainingPair {
                prompt: entry.prompt.clone(),
                response: entry.response.clone(),
            };
            serde_json::to_writer(&mut writer, &pair)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        tracing::info!(count = queue.len(), path = %output.display(), "Exported training queue");
        Ok(queue.len())
    }
}

fn promotion_reason(turn: &Turn) -> String {
    format!("quality={:.2}, access={}", turn.quality, turn.access_count)
}
