//! Margin Storage Layer
//!
//! Implements the domain's `ObjectStore`, `Notifier` and `TrackingStore`
//! traits.
//!
//! # Architecture
//!
//! - [`FsObjectStore`]: buckets and keys mapped onto a directory tree
//! - [`SqliteTrackingStore`]: per-job counters in SQLite, decremented with a
//!   conditional `UPDATE ... RETURNING` once per reviewed page
//! - [`OutboxNotifier`]: published messages appended to per-topic JSON-lines
//!   files
//! - [`memory`]: in-process fakes with failure injection, for tests
//!
//! # Examples
//!
//! ```no_run
//! use margin_domain::{JobTrackingRecord, TrackingStore};
//! use margin_store::SqliteTrackingStore;
//!
//! let store = SqliteTrackingStore::new("margin.db").unwrap();
//! store.create(&JobTrackingRecord::new("job-1", 3)).unwrap();
//! ```

#![warn(missing_docs)]

pub mod fs;
pub mod memory;
pub mod outbox;
pub mod sqlite;

pub use fs::FsObjectStore;
pub use memory::{FailOn, MemoryNotifier, MemoryObjectStore, MemoryTrackingStore};
pub use outbox::{OutboxNotifier, OutboxRecord};
pub use sqlite::SqliteTrackingStore;

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A record for this job already exists
    #[error("Job already tracked: {0}")]
    Duplicate(String),

    /// Invalid bucket or key
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    /// Collaborator refused the call (raised by the in-memory fakes)
    #[error("Unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
