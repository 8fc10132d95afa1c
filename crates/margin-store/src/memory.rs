//! In-memory collaborators for tests
//!
//! All fakes are cheap to clone; clones share state, so a test can hand one
//! clone to the code under test and inspect another afterwards.

use crate::{Result, StoreError};
use margin_domain::traits::{Notification, Notifier, ObjectStore, TrackingStore};
use margin_domain::{DecrementOutcome, JobTrackingRecord};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Object store operation a failure can be injected into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailOn {
    /// `get`
    Get,
    /// `put`
    Put,
    /// `delete`
    Delete,
}

#[derive(Debug, Clone)]
struct StoredObject {
    body: Vec<u8>,
    content_type: String,
}

#[derive(Debug, Default)]
struct ObjectsInner {
    objects: BTreeMap<(String, String), StoredObject>,
    failures: HashSet<(FailOn, String, String)>,
    deletes: Vec<(String, String)>,
}

/// In-memory [`ObjectStore`]
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    inner: Arc<Mutex<ObjectsInner>>,
}

impl MemoryObjectStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object
    pub fn insert(&self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) {
        lock(&self.inner).objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body: body.into(),
                content_type: "application/octet-stream".to_string(),
            },
        );
    }

    /// Make every `op` on `bucket/key` fail
    pub fn fail_on(&self, op: FailOn, bucket: &str, key: &str) {
        lock(&self.inner)
            .failures
            .insert((op, bucket.to_string(), key.to_string()));
    }

    /// Whether an object exists
    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        lock(&self.inner)
            .objects
            .contains_key(&(bucket.to_string(), key.to_string()))
    }

    /// Body of an object
    pub fn body(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        lock(&self.inner)
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.body.clone())
    }

    /// Content type an object was written with
    pub fn content_type(&self, bucket: &str, key: &str) -> Option<String> {
        lock(&self.inner)
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.content_type.clone())
    }

    /// Keys in `bucket` starting with `prefix`, sorted
    pub fn keys(&self, bucket: &str, prefix: &str) -> Vec<String> {
        lock(&self.inner)
            .objects
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .map(|(_, k)| k.clone())
            .collect()
    }

    /// Every successful or attempted delete, in call order
    pub fn deletes(&self) -> Vec<(String, String)> {
        lock(&self.inner).deletes.clone()
    }

    fn check(&self, inner: &ObjectsInner, op: FailOn, bucket: &str, key: &str) -> Result<()> {
        if inner
            .failures
            .contains(&(op, bucket.to_string(), key.to_string()))
        {
            return Err(StoreError::Unavailable(format!(
                "injected {:?} failure for {}/{}",
                op, bucket, key
            )));
        }
        Ok(())
    }
}

impl ObjectStore for MemoryObjectStore {
    type Error = StoreError;

    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let inner = lock(&self.inner);
        self.check(&inner, FailOn::Get, bucket, key)?;
        Ok(inner
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.body.clone()))
    }

    fn put(&self, bucket: &str, key: &str, body: &[u8], content_type: &str) -> Result<()> {
        let mut inner = lock(&self.inner);
        self.check(&inner, FailOn::Put, bucket, key)?;
        inner.objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body: body.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        let mut inner = lock(&self.inner);
        inner.deletes.push((bucket.to_string(), key.to_string()));
        self.check(&inner, FailOn::Delete, bucket, key)?;
        inner.objects.remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}

type PublishFilter = Arc<dyn Fn(&str, &Notification) -> bool + Send + Sync>;

/// In-memory [`Notifier`] that records every message
#[derive(Clone, Default)]
pub struct MemoryNotifier {
    published: Arc<Mutex<Vec<(String, Notification)>>>,
    fail_when: Option<PublishFilter>,
}

impl MemoryNotifier {
    /// Create a notifier that accepts every message
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a notifier that rejects messages matching `predicate`
    pub fn failing_when<F>(predicate: F) -> Self
    where
        F: Fn(&str, &Notification) -> bool + Send + Sync + 'static,
    {
        Self {
            published: Arc::default(),
            fail_when: Some(Arc::new(predicate)),
        }
    }

    /// Messages accepted so far, as (topic, message)
    pub fn published(&self) -> Vec<(String, Notification)> {
        lock(&self.published).clone()
    }

    /// Messages accepted on `topic`
    pub fn published_to(&self, topic: &str) -> Vec<Notification> {
        lock(&self.published)
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl std::fmt::Debug for MemoryNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryNotifier")
            .field("published", &lock(&self.published).len())
            .field("filtered", &self.fail_when.is_some())
            .finish()
    }
}

impl Notifier for MemoryNotifier {
    type Error = StoreError;

    fn publish(&self, topic: &str, message: &Notification) -> Result<()> {
        if let Some(fail_when) = &self.fail_when {
            if fail_when(topic, message) {
                return Err(StoreError::Unavailable(format!(
                    "injected publish failure on {}",
                    topic
                )));
            }
        }
        lock(&self.published).push((topic.to_string(), message.clone()));
        Ok(())
    }
}

/// Counter and counted page keys of one job
type JobCounter = (Arc<AtomicU32>, Arc<Mutex<HashSet<String>>>);

#[derive(Debug)]
struct TrackedJob {
    pages_sent: Arc<AtomicU32>,
    reviewed: Arc<Mutex<HashSet<String>>>,
    date_sent: u64,
}

#[derive(Debug, Default)]
struct TrackingInner {
    jobs: HashMap<String, TrackedJob>,
    fail_all: bool,
}

/// In-memory [`TrackingStore`]
///
/// Counters are atomics decremented with a compare-and-swap loop; the map
/// lock is only held long enough to look the counter up. Each job keeps the
/// set of page keys already counted.
#[derive(Debug, Clone, Default)]
pub struct MemoryTrackingStore {
    inner: Arc<Mutex<TrackingInner>>,
}

impl MemoryTrackingStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail
    pub fn fail_all(&self) {
        lock(&self.inner).fail_all = true;
    }

    fn counter(&self, job_id: &str) -> Result<Option<JobCounter>> {
        let inner = lock(&self.inner);
        if inner.fail_all {
            return Err(StoreError::Unavailable("injected tracking failure".to_string()));
        }
        Ok(inner
            .jobs
            .get(job_id)
            .map(|j| (Arc::clone(&j.pages_sent), Arc::clone(&j.reviewed))))
    }
}

impl TrackingStore for MemoryTrackingStore {
    type Error = StoreError;

    fn create(&self, record: &JobTrackingRecord) -> Result<()> {
        let mut inner = lock(&self.inner);
        if inner.fail_all {
            return Err(StoreError::Unavailable("injected tracking failure".to_string()));
        }
        if inner.jobs.contains_key(&record.job_id) {
            return Err(StoreError::Duplicate(record.job_id.clone()));
        }
        inner.jobs.insert(
            record.job_id.clone(),
            TrackedJob {
                pages_sent: Arc::new(AtomicU32::new(record.pages_sent)),
                reviewed: Arc::default(),
                date_sent: record.date_sent,
            },
        );
        Ok(())
    }

    fn get(&self, job_id: &str) -> Result<Option<JobTrackingRecord>> {
        let inner = lock(&self.inner);
        if inner.fail_all {
            return Err(StoreError::Unavailable("injected tracking failure".to_string()));
        }
        Ok(inner.jobs.get(job_id).map(|job| JobTrackingRecord {
            job_id: job_id.to_string(),
            pages_sent: job.pages_sent.load(Ordering::SeqCst),
            date_sent: job.date_sent,
        }))
    }

    fn decrement(&self, job_id: &str, page_key: &str) -> Result<DecrementOutcome> {
        let (counter, reviewed) = match self.counter(job_id)? {
            Some(job) => job,
            None => return Ok(DecrementOutcome::NotTracked),
        };
        if !lock(&reviewed).insert(page_key.to_string()) {
            return Ok(DecrementOutcome::AlreadyCounted);
        }

        let mut current = counter.load(Ordering::SeqCst);
        loop {
            if current == 0 {
                return Ok(DecrementOutcome::AlreadyComplete);
            }
            match counter.compare_exchange(current, current - 1, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return Ok(DecrementOutcome::Remaining(current - 1)),
                Err(actual) => current = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_failure_injection() {
        let store = MemoryObjectStore::new();
        store.insert("b", "k", b"data".to_vec());
        store.fail_on(FailOn::Get, "b", "k");

        assert!(store.get("b", "k").is_err());
        assert!(store.get("b", "other").unwrap().is_none());
        assert!(store.put("b", "k", b"x", "text/plain").is_ok());
        assert_eq!(store.content_type("b", "k").as_deref(), Some("text/plain"));
    }

    #[test]
    fn test_notifier_filter() {
        let notifier = MemoryNotifier::failing_when(|_, m| m.body.contains("bad"));
        assert!(notifier.publish("t", &Notification::new("good")).is_ok());
        assert!(notifier.publish("t", &Notification::new("bad")).is_err());
        assert_eq!(notifier.published_to("t").len(), 1);
    }

    #[test]
    fn test_tracking_decrement_floor() {
        let store = MemoryTrackingStore::new();
        store.create(&JobTrackingRecord::new("job", 1)).unwrap();
        assert_eq!(store.decrement("job", "p1").unwrap(), DecrementOutcome::Remaining(0));
        assert_eq!(store.decrement("job", "p1").unwrap(), DecrementOutcome::AlreadyCounted);
        assert_eq!(store.decrement("job", "p2").unwrap(), DecrementOutcome::AlreadyComplete);
        assert_eq!(store.decrement("other", "p1").unwrap(), DecrementOutcome::NotTracked);
        assert!(store.create(&JobTrackingRecord::new("job", 4)).is_err());
    }

    #[test]
    fn test_repeated_page_leaves_counter_alone() {
        let store = MemoryTrackingStore::new();
        store.create(&JobTrackingRecord::new("job", 2)).unwrap();

        assert_eq!(store.decrement("job", "p1").unwrap(), DecrementOutcome::Remaining(1));
        assert_eq!(store.decrement("job", "p1").unwrap(), DecrementOutcome::AlreadyCounted);
        assert_eq!(store.get("job").unwrap().unwrap().pages_sent, 1);
    }

    #[test]
    fn test_tracking_failure_injection() {
        let store = MemoryTrackingStore::new();
        store.fail_all();
        assert!(store.decrement("job", "p1").is_err());
        assert!(store.create(&JobTrackingRecord::new("job", 1)).is_err());
    }
}
