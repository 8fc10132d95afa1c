//! Concurrency tests for the tracking stores
//!
//! Every decrement of a distinct page must observe a distinct post-decrement
//! value, so exactly one caller sees the counter reach zero. Redelivered pages
//! never move the counter.

use margin_domain::traits::TrackingStore;
use margin_domain::{DecrementOutcome, JobTrackingRecord};
use margin_store::{MemoryTrackingStore, SqliteTrackingStore};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

const PAGES: u32 = 16;
const EXTRA: u32 = 4;

fn page_key(page: u32) -> String {
    format!("s3://out/job-1/pages/{}/page/{}.pdf", page, page)
}

fn assert_distinct_outcomes(outcomes: Vec<DecrementOutcome>) {
    let remaining: Vec<u32> = outcomes
        .iter()
        .filter_map(|o| match o {
            DecrementOutcome::Remaining(n) => Some(*n),
            _ => None,
        })
        .collect();
    let distinct: BTreeSet<u32> = remaining.iter().copied().collect();

    assert_eq!(remaining.len(), PAGES as usize, "one decrement per page");
    assert_eq!(distinct, (0..PAGES).collect::<BTreeSet<_>>());
    assert_eq!(outcomes.iter().filter(|o| o.completed_job()).count(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == DecrementOutcome::AlreadyComplete)
            .count(),
        EXTRA as usize
    );
}

#[test]
fn test_sqlite_concurrent_decrements_across_connections() {
    let dir = TempDir::new().unwrap();
    let db: PathBuf = dir.path().join("tracking.db");

    SqliteTrackingStore::new(&db)
        .unwrap()
        .create(&JobTrackingRecord::new("job-1", PAGES))
        .unwrap();

    let handles: Vec<_> = (0..PAGES + EXTRA)
        .map(|page| {
            let db = db.clone();
            thread::spawn(move || {
                // Each worker opens its own connection, like separate invocations would
                let store = SqliteTrackingStore::new(&db).unwrap();
                store.decrement("job-1", &page_key(page)).unwrap()
            })
        })
        .collect();
    let outcomes = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_distinct_outcomes(outcomes);
    let store = SqliteTrackingStore::new(&db).unwrap();
    assert_eq!(store.get("job-1").unwrap().unwrap().pages_sent, 0);
}

#[test]
fn test_memory_concurrent_decrements() {
    let store = Arc::new(MemoryTrackingStore::new());
    store.create(&JobTrackingRecord::new("job-1", PAGES)).unwrap();

    let handles: Vec<_> = (0..PAGES + EXTRA)
        .map(|page| {
            let store = Arc::clone(&store);
            thread::spawn(move || store.decrement("job-1", &page_key(page)).unwrap())
        })
        .collect();
    let outcomes = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_distinct_outcomes(outcomes);
}

#[test]
fn test_jobs_are_independent() {
    let store = SqliteTrackingStore::new(":memory:").unwrap();
    store.create(&JobTrackingRecord::new("a", 1)).unwrap();
    store.create(&JobTrackingRecord::new("b", 2)).unwrap();

    assert!(store.decrement("a", "p1").unwrap().completed_job());
    assert_eq!(store.decrement("b", "p1").unwrap(), DecrementOutcome::Remaining(1));
    assert_eq!(store.list().unwrap().len(), 2);
}

#[test]
fn test_sqlite_redelivered_pages_count_once() {
    let dir = TempDir::new().unwrap();
    let db: PathBuf = dir.path().join("tracking.db");

    SqliteTrackingStore::new(&db)
        .unwrap()
        .create(&JobTrackingRecord::new("job-1", PAGES))
        .unwrap();

    // Every page is delivered twice, from separate connections
    let handles: Vec<_> = (0..PAGES * 2)
        .map(|n| {
            let db = db.clone();
            thread::spawn(move || {
                let store = SqliteTrackingStore::new(&db).unwrap();
                store.decrement("job-1", &page_key(n % PAGES)).unwrap()
            })
        })
        .collect();
    let outcomes: Vec<DecrementOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(outcomes.iter().filter(|o| o.completed_job()).count(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == DecrementOutcome::AlreadyCounted)
            .count(),
        PAGES as usize
    );
    let store = SqliteTrackingStore::new(&db).unwrap();
    assert_eq!(store.get("job-1").unwrap().unwrap().pages_sent, 0);
}

#[test]
fn test_redelivery_before_last_page_keeps_job_open() {
    let store = MemoryTrackingStore::new();
    store.create(&JobTrackingRecord::new("job-1", 2)).unwrap();

    assert_eq!(store.decrement("job-1", &page_key(1)).unwrap(), DecrementOutcome::Remaining(1));
    assert_eq!(
        store.decrement("job-1", &page_key(1)).unwrap(),
        DecrementOutcome::AlreadyCounted
    );
    assert_eq!(store.get("job-1").unwrap().unwrap().pages_sent, 1);
}
