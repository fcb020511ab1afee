//! Memory Engine Integration Tests
//!
//! Exercises the engine against on-disk databases:
//! - Data survives reopening the file
//! - Concurrent ingest yields dense, distinct ids and exact session aggregates
//! - Recency order agrees with commit order under contention
//! - Reads proceed while other threads write
//! - Forgotten turns disappear from every retrieval path

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use limpha::models::session::SessionHandle;
use limpha::models::turn::ForgetOutcome;
use limpha::services::memory::{MemoryEngine, SearchOutcome};
use limpha::storage::database::Database;
use limpha::AffectState;

// ============================================================================
// Helpers
// ============================================================================

fn open_engine(path: &std::path::Path, session: &str, pool_size: u32) -> MemoryEngine {
    let db = Database::open(path, pool_size).expect("Failed to open test database");
    MemoryEngine::open(db, SessionHandle::new(session)).expect("Failed to open engine")
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_turns_survive_reopen() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("limpha.db");

    let id = {
        let engine = open_engine(&path, "first-run", 2);
        let state = AffectState {
            temperature: 0.89,
            pain: 0.08,
            ..Default::default()
        };
        engine
            .store("Who are you?", "I'm Yent. More like an echo.", Some(&state))
            .unwrap()
    };

    let engine = open_engine(&path, "second-run", 2);
    let turn = engine.recall(id).unwrap().expect("turn persisted");
    assert_eq!(turn.prompt, "Who are you?");
    assert_eq!(turn.temperature, 0.89);
    assert_eq!(turn.session_id, "first-run");
    assert_eq!(engine.search("echo", 10).unwrap().len(), 1);

    let stats = engine.stats().unwrap();
    assert_eq!(stats.total_conversations, 1);
    assert_eq!(stats.total_sessions, 2);
    assert_eq!(stats.current_session, "second-run");
    assert!(stats.db_size_bytes > 0);
    assert_eq!(stats.db_path, path.display().to_string());
}

#[test]
fn test_file_database_runs_in_wal_mode() {
    let temp_dir = tempfile::tempdir().unwrap();
    let engine = open_engine(&temp_dir.path().join("limpha.db"), "wal", 2);
    assert_eq!(engine.database().journal_mode().unwrap().to_lowercase(), "wal");
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_stores_assign_dense_ids() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 25;

    let temp_dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(open_engine(&temp_dir.path().join("limpha.db"), "concurrent", 8));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let mut ids = Vec::with_capacity(PER_THREAD);
                for i in 0..PER_THREAD {
                    let response = "x".repeat(5 + (t * PER_THREAD + i) % 240);
                    ids.push(engine.store(&format!("thread {} turn {}", t, i), &response, None).unwrap());
                }
                ids
            })
        })
        .collect();

    let mut all_ids = Vec::new();
    for handle in handles {
        let ids = handle.join().unwrap();
        // each caller sees its own ids strictly increasing
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        all_ids.extend(ids);
    }

    let total = THREADS * PER_THREAD;
    let unique: HashSet<i64> = all_ids.iter().copied().collect();
    assert_eq!(unique.len(), total);
    assert_eq!(unique, (1..=total as i64).collect::<HashSet<_>>());

    let session = engine.session_summary("concurrent").unwrap().unwrap();
    assert_eq!(session.turn_count, total as i64);

    let turns = engine.recent(total, None).unwrap();
    assert_eq!(turns.len(), total);
    let mean = turns.iter().map(|t| t.quality).sum::<f64>() / total as f64;
    assert!((session.avg_quality - mean).abs() < 1e-9);
}

#[test]
fn test_recent_order_matches_commit_order_under_contention() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 50;

    let temp_dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(open_engine(&temp_dir.path().join("limpha.db"), "ordered", 8));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    engine.store(&format!("writer {} turn {}", t, i), "ack", None).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let total = THREADS * PER_THREAD;
    let turns = engine.recent(total, None).unwrap();
    assert_eq!(turns.len(), total);

    // newest first: ids strictly decrease and timestamps never increase
    let inversions = turns
        .windows(2)
        .filter(|w| w[0].id <= w[1].id || w[0].timestamp < w[1].timestamp)
        .count();
    assert_eq!(inversions, 0);

    let newest = engine.recent(1, None).unwrap();
    assert_eq!(newest[0].id, total as i64);
}

#[test]
fn test_concurrent_recalls_are_not_lost() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 10;

    let temp_dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(open_engine(&temp_dir.path().join("limpha.db"), "recalls", 4));
    let id = engine.store("shared", "a turn everyone recalls", None).unwrap();

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for _ in 0..PER_THREAD {
                    engine.recall(id).unwrap().unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let turn = engine.get_turn(id).unwrap().unwrap();
    assert_eq!(turn.access_count, (THREADS * PER_THREAD) as i64);
}

#[test]
fn test_reads_proceed_during_writes() {
    let temp_dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(open_engine(&temp_dir.path().join("limpha.db"), "mixed", 4));
    engine.store("seed resonance", "the first echo", None).unwrap();

    let writer = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for i in 0..50 {
                engine
                    .store(&format!("resonance {}", i), "another echo", None)
                    .unwrap();
            }
        })
    };

    let mut last_seen = 0;
    for _ in 0..50 {
        let hits = engine.search("resonance", 100).unwrap();
        assert!(hits.len() >= last_seen);
        last_seen = hits.len();
        assert!(!engine.recent(5, None).unwrap().is_empty());
    }
    writer.join().unwrap();

    assert_eq!(engine.search("resonance", 100).unwrap().len(), 51);
}

// ============================================================================
// Retrieval
// ============================================================================

#[test]
fn test_state_search_returns_own_state_first() {
    let temp_dir = tempfile::tempdir().unwrap();
    let engine = open_engine(&temp_dir.path().join("limpha.db"), "state", 2);

    let calm = AffectState {
        temperature: 0.2,
        destiny: 0.9,
        ..Default::default()
    };
    let agitated = AffectState {
        temperature: 0.9,
        pain: 0.7,
        tension: 0.8,
        ..Default::default()
    };
    let calm_id = engine.store("calm", "steady reply", Some(&calm)).unwrap();
    engine.store("agitated", "sharp reply", Some(&agitated)).unwrap();

    let matches = engine.search_by_state(&calm, 5, 0.0).unwrap();
    assert_eq!(matches[0].turn.id, calm_id);
    assert!(matches[0].distance < 1e-2);
}

#[test]
fn test_malformed_search_is_distinct_from_no_match() {
    let temp_dir = tempfile::tempdir().unwrap();
    let engine = open_engine(&temp_dir.path().join("limpha.db"), "search", 2);
    engine.store("lantern", "glow", None).unwrap();

    assert_eq!(
        engine.search_checked("nothingmatches", 10).unwrap(),
        SearchOutcome::Hits(Vec::new())
    );
    assert!(matches!(
        engine.search_checked("lantern AND", 10).unwrap(),
        SearchOutcome::Malformed(_)
    ));
}

#[test]
fn test_forgotten_turn_leaves_every_path() {
    let temp_dir = tempfile::tempdir().unwrap();
    let engine = open_engine(&temp_dir.path().join("limpha.db"), "forget", 2);
    engine.store("keep", "ordinary reply", None).unwrap();
    let id = engine.store("zyzzyva", "uniquely indexed", None).unwrap();
    assert_eq!(engine.search("zyzzyva", 10).unwrap().len(), 1);

    assert_eq!(engine.forget(id).unwrap(), ForgetOutcome::Forgotten);

    assert!(engine.search("zyzzyva", 10).unwrap().is_empty());
    assert!(engine.recall(id).unwrap().is_none());
    assert!(engine.recent(10, None).unwrap().iter().all(|t| t.id != id));
    assert_eq!(engine.stats().unwrap().total_conversations, 1);
}
