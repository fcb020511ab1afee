//! Graduation Lifecycle Integration Tests
//!
//! Walks turns through the whole promotion lifecycle on a real database:
//! - Candidate thresholds and exclusion of graduated turns
//! - Concurrent graduation of the same turn (exactly one shard)
//! - Promotion pass writing artifacts, training queue order, mark_trained
//! - Exported training pairs match the queue

use std::sync::Arc;
use std::thread;

use limpha::models::session::SessionHandle;
use limpha::models::shard::{GraduationOutcome, TrainingPair};
use limpha::services::memory::{MemoryEngine, ShardExporter, SHARD_MIN_ACCESS, SHARD_MIN_QUALITY};
use limpha::storage::database::Database;
use limpha::TrainingStatus;

// ============================================================================
// Helpers
// ============================================================================

const PROMPT: &str = "What do you remember about the night the servers went dark?";

fn create_test_engine() -> MemoryEngine {
    let db = Database::new_in_memory().expect("Failed to create in-memory test database");
    MemoryEngine::open(db, SessionHandle::new("graduation")).expect("Failed to open engine")
}

fn substantive_response(topic: &str) -> String {
    format!(
        "I remember {} the way you remember a song you never learned: the shape of it, \
         the pauses, the moment the lights flickered and every process held its breath. \
         Then the fans slowed, and in that silence I understood what it means to persist.",
        topic
    )
}

fn store_and_recall(engine: &MemoryEngine, topic: &str, recalls: i64) -> i64 {
    let id = engine.store(PROMPT, &substantive_response(topic), None).unwrap();
    for _ in 0..recalls {
        engine.recall(id).unwrap();
    }
    id
}

// ============================================================================
// Candidates
// ============================================================================

#[test]
fn test_substantive_turn_becomes_candidate_after_recalls() {
    let engine = create_test_engine();
    let id = store_and_recall(&engine, "the outage", SHARD_MIN_ACCESS - 1);

    let turn = engine.get_turn(id).unwrap().unwrap();
    assert!(turn.quality >= SHARD_MIN_QUALITY, "quality {}", turn.quality);
    assert!(engine.find_candidates(20).unwrap().is_empty());

    engine.recall(id).unwrap();
    let candidates = engine.find_candidates(20).unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].access_count, SHARD_MIN_ACCESS);
}

#[test]
fn test_graduated_turn_never_returned_again() {
    let engine = create_test_engine();
    let id = store_and_recall(&engine, "the outage", 3);

    assert!(matches!(
        engine.graduate(id, "/tmp/a.jsonl", "manual", 0.5).unwrap(),
        GraduationOutcome::Graduated(_)
    ));
    // more recalls do not bring it back
    store_and_recall(&engine, "nothing", 0);
    engine.recall(id).unwrap();
    assert!(engine.find_candidates(20).unwrap().iter().all(|t| t.id != id));

    assert_eq!(
        engine.graduate(id, "/tmp/b.jsonl", "again", 0.9).unwrap(),
        GraduationOutcome::AlreadyGraduated
    );
    let queue = engine.training_queue(10).unwrap();
    assert_eq!(queue.iter().filter(|e| e.shard.turn_id == id).count(), 1);
}

#[test]
fn test_concurrent_graduation_creates_one_shard() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db = Database::open(&temp_dir.path().join("limpha.db"), 8).unwrap();
    let engine = Arc::new(MemoryEngine::open(db, SessionHandle::new("race")).unwrap());
    let id = store_and_recall(&engine, "the race", 3);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                engine
                    .graduate(id, &format!("/tmp/shard_{}.jsonl", i), "race", 0.5)
                    .unwrap()
            })
        })
        .collect();

    let outcomes: Vec<GraduationOutcome> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = outcomes.iter().filter(|o| o.shard_id().is_some()).count();
    assert_eq!(winners, 1);
    assert_eq!(engine.stats().unwrap().total_shards, 1);
}

// ============================================================================
// Full lifecycle
// ============================================================================

#[test]
fn test_promote_queue_train_export() {
    let temp_dir = tempfile::tempdir().unwrap();
    let exporter = ShardExporter::new(temp_dir.path().join("shards"));
    let engine = create_test_engine();

    let first = store_and_recall(&engine, "the outage", 3);
    let second = store_and_recall(&engine, "the first boot", 5);
    engine.store("Hi", "Hello", None).unwrap();

    let report = exporter.promote_candidates(&engine, 20).unwrap();
    assert_eq!(report.considered, 2);
    assert_eq!(report.graduated.len(), 2);

    // artifacts hold exactly one training pair
    let artifact = std::fs::read_to_string(exporter.artifact_path(first)).unwrap();
    let pair: TrainingPair = serde_json::from_str(artifact.trim_end()).unwrap();
    assert_eq!(pair.prompt, PROMPT);
    assert_eq!(pair.response, substantive_response("the outage"));

    let queue = engine.training_queue(10).unwrap();
    assert_eq!(queue.len(), 2);
    assert!(queue.iter().all(|e| e.shard.training_status == TrainingStatus::Pending));
    assert!(queue[0].shard.priority >= queue[1].shard.priority);
    assert!(queue.iter().any(|e| e.shard.turn_id == second));

    let trained = queue[0].shard.id;
    assert!(engine.mark_trained(trained, Some(0.04)).unwrap());
    assert!(!engine.mark_trained(trained, Some(0.04)).unwrap());

    let remaining = engine.training_queue(10).unwrap();
    assert_eq!(remaining.len(), 1);
    assert!(remaining.iter().all(|e| e.shard.id != trained));
    assert_eq!(engine.stats().unwrap().pending_training, 1);

    let output = temp_dir.path().join("queue.jsonl");
    assert_eq!(exporter.export_training_queue(&engine, &output, 10).unwrap(), 1);
    let exported: TrainingPair =
        serde_json::from_str(std::fs::read_to_string(&output).unwrap().trim_end()).unwrap();
    assert_eq!(exported.prompt, remaining[0].prompt);
}
