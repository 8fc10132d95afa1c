//! Trait definitions for external interactions
//!
//! These traits define the boundaries between domain logic and infrastructure.
//! Infrastructure implementations live in `margin-store`.

use crate::{DecrementOutcome, JobTrackingRecord};

/// Key-addressed blob storage
///
/// Implemented by the infrastructure layer (margin-store)
pub trait ObjectStore {
    /// Error type for store operations
    type Error;

    /// Read an object; `Ok(None)` means it does not exist
    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Write an object, replacing any existing one
    fn put(&self, bucket: &str, key: &str, body: &[u8], content_type: &str)
        -> Result<(), Self::Error>;

    /// Delete an object; deleting a missing object succeeds
    fn delete(&self, bucket: &str, key: &str) -> Result<(), Self::Error>;
}

/// A message published to a topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Optional subject line
    pub subject: Option<String>,

    /// Message body
    pub body: String,
}

impl Notification {
    /// Create a message without a subject
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            subject: None,
            body: body.into(),
        }
    }

    /// Set the subject line
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

/// Pub/sub publisher
///
/// Implemented by the infrastructure layer (margin-store)
pub trait Notifier {
    /// Error type for publish operations
    type Error;

    /// Publish `message` to `topic`
    fn publish(&self, topic: &str, message: &Notification) -> Result<(), Self::Error>;
}

/// Per-job outstanding-page counters
///
/// Implemented by the infrastructure layer (margin-store)
pub trait TrackingStore {
    /// Error type for tracking operations
    type Error;

    /// Create the record for a job; an existing record is an error
    fn create(&self, record: &JobTrackingRecord) -> Result<(), Self::Error>;

    /// Get the record for a job
    fn get(&self, job_id: &str) -> Result<Option<JobTrackingRecord>, Self::Error>;

    /// Atomically count one reviewed page, never going below zero
    ///
    /// `page_key` identifies the reviewed page within the job. Only the first
    /// call for a given key decrements; repeats return
    /// [`DecrementOutcome::AlreadyCounted`]. Concurrent callers with distinct
    /// keys must each observe a distinct post-decrement value.
    fn decrement(&self, job_id: &str, page_key: &str) -> Result<DecrementOutcome, Self::Error>;
}
