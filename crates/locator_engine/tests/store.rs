use std::fs;
use std::sync::Arc;

use locator_core::{Branch, RunMode, RunState, RunStatus};
use locator_engine::{
    ensure_state_dir, AtomicFileWriter, DurableStore, FileStore, LastOutcome, MemoryStore,
    ResultCache, RunStateStore, StoreError, RUN_STATE_KEY,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn branch(n: u32) -> Branch {
    Branch {
        navigable_ref: format!("https://crm.example.com/nihul/Wizard.php?CompanyID={n}"),
        label: format!("Company {n}"),
        id: n.to_string(),
    }
}

#[test]
fn creates_missing_state_dir() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("state");
    ensure_state_dir(&dir).unwrap();
    assert!(dir.is_dir());
}

#[test]
fn atomic_writer_replaces_existing_file() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());
    let first = writer.write("run.ron", "one").unwrap();
    let second = writer.write("run.ron", "two").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(second).unwrap(), "two");
}

#[test]
fn file_store_round_trips_and_deletes() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path());

    assert_eq!(store.get("run_state_v1").unwrap(), None);
    store.set("run_state_v1", "payload").unwrap();
    assert_eq!(store.get("run_state_v1").unwrap().as_deref(), Some("payload"));
    assert!(temp.path().join("run_state_v1.ron").is_file());

    store.delete("run_state_v1").unwrap();
    assert_eq!(store.get("run_state_v1").unwrap(), None);
    // Deleting a missing key is not an error.
    store.delete("run_state_v1").unwrap();
}

#[test]
fn file_store_rejects_path_like_keys() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path());
    assert!(matches!(
        store.set("../escape", "x"),
        Err(StoreError::InvalidKey(_))
    ));
    assert!(matches!(store.get(""), Err(StoreError::InvalidKey(_))));
}

#[test]
fn run_state_survives_a_fresh_store_handle() {
    let temp = TempDir::new().unwrap();
    let runs = RunStateStore::new(Arc::new(FileStore::new(temp.path())));
    let mut state = RunState::new();
    state.start("Alice", RunMode::ScanAll, 10);
    state.advance_to(branch(1));
    state.enqueue(vec![branch(2), branch(3)]);
    runs.save(&state).unwrap();

    // A new handle stands in for a context reset.
    let reopened = RunStateStore::new(Arc::new(FileStore::new(temp.path())));
    let mut state = reopened.load().unwrap().expect("run persisted");
    assert_eq!(state.query, "Alice");
    assert_eq!(state.mode, RunMode::ScanAll);
    assert_eq!(state.status, RunStatus::LeafScanning);
    assert_eq!(state.current_branch, Some(branch(1)));
    assert_eq!(state.remaining_branches.len(), 2);

    assert_eq!(state.dequeue_next(), Some(branch(2)));
    reopened.save(&state).unwrap();
    assert_eq!(runs.load().unwrap().unwrap().remaining_branches.len(), 1);
}

#[test]
fn finishing_clears_queue_and_clear_removes_record() {
    let store = Arc::new(MemoryStore::new());
    let runs = RunStateStore::new(store.clone());
    let mut state = RunState::new();
    state.start("bob", RunMode::ScanAll, 0);
    state.enqueue(vec![branch(4)]);
    state.finish(RunStatus::NotFound);
    runs.save(&state).unwrap();

    let state = runs.load().unwrap().expect("finished run persisted");
    assert!(state.remaining_branches.is_empty());
    assert!(!state.is_active());

    runs.clear().unwrap();
    assert_eq!(store.get(RUN_STATE_KEY).unwrap(), None);
    assert_eq!(runs.load().unwrap(), None);
}

#[test]
fn corrupt_run_record_is_a_decode_error() {
    let store = Arc::new(MemoryStore::new());
    store.set(RUN_STATE_KEY, "not ron at all {").unwrap();
    let runs = RunStateStore::new(store);
    assert!(matches!(runs.load(), Err(StoreError::Decode { .. })));
}

#[test]
fn last_outcome_is_recorded_and_cleared() {
    let runs = RunStateStore::new(Arc::new(MemoryStore::new()));
    let outcome = LastOutcome {
        recorded_at: 42,
        found: true,
        label: "alice | Acme | id 7".to_string(),
    };
    runs.record_outcome(&outcome).unwrap();
    assert_eq!(runs.last_outcome().unwrap(), Some(outcome));
    runs.clear_outcome().unwrap();
    assert_eq!(runs.last_outcome().unwrap(), None);
}

#[test]
fn cache_keys_are_normalized_and_last_write_wins() {
    let temp = TempDir::new().unwrap();
    let cache = ResultCache::new(Arc::new(FileStore::new(temp.path())));
    assert!(cache.is_empty().unwrap());

    cache.record("  Alice  Smith ", "7", 100).unwrap();
    assert_eq!(cache.lookup("alice smith").unwrap().as_deref(), Some("7"));

    cache.record("ALICE SMITH", "9", 200).unwrap();
    let entry = cache.entry("alice smith").unwrap().unwrap();
    assert_eq!(entry.candidate_id, "9");
    assert_eq!(entry.recorded_at, 200);
    assert_eq!(cache.len().unwrap(), 1);

    assert_eq!(cache.lookup("carol").unwrap(), None);
}
