//! Margin Tracker
//!
//! Counts reviewed pages back down and announces when a job's review is done.
//!
//! # Overview
//!
//! When the splitter dispatches review tasks it records how many went out.
//! Each review-completed callback is resolved to a job id and the artifact
//! the reviewer saw; the tracker then:
//!
//! 1. atomically decrements the job's outstanding count, once per page,
//! 2. deletes the page artifact,
//! 3. publishes a single "Job Complete" notification on the decrement that
//!    reaches zero.
//!
//! The decrement is a conditional update in the tracking store keyed by the
//! page's artifact, so any number of concurrent or redelivered callbacks for
//! one job produce exactly one notification.
//!
//! # Lifecycle
//!
//! | State | Event | Next |
//! |-------|-------|------|
//! | `TRACKED(n > 1)` | page reviewed | `TRACKED(n - 1)` |
//! | `TRACKED(1)` | page reviewed | `COMPLETE` + notification |
//! | `TRACKED(n)` | counted page reviewed again | `TRACKED(n)` |
//! | `COMPLETE` | page reviewed | `COMPLETE` (no notification) |
//!
//! # Usage
//!
//! ```no_run
//! use margin_domain::{InboundEvent, ReviewCompleted};
//! use margin_store::{FsObjectStore, OutboxNotifier, SqliteTrackingStore};
//! use margin_tracker::{CompletionTracker, ReviewIngestor, TrackerConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let tracker = CompletionTracker::new(
//!     FsObjectStore::new("/var/lib/margin/objects"),
//!     OutboxNotifier::new("/var/lib/margin/outbox"),
//!     SqliteTrackingStore::new("/var/lib/margin/tracking.db")?,
//!     TrackerConfig::default(),
//! )?;
//! let ingestor = ReviewIngestor::new(tracker);
//!
//! let raw = br#"{"payload": {"s3Uri": "s3://review/requests/1.json"}}"#;
//! if let InboundEvent::ReviewCompleted(event) = InboundEvent::parse(raw)? {
//!     let report = ingestor.ingest(&event)?;
//!     println!("Remaining: {:?}", report.remaining());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! ```toml
//! job_complete_topic = "job-complete"
//! delete_artifacts = true
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod ingestor;
mod metrics;
mod tracker;
mod types;


pub use config::{TrackerConfig, COMPLETION_SUBJECT};
pub use error::TrackerError;
pub use ingestor::ReviewIngestor;
pub use metrics::TrackerMetrics;
pub use tracker::{completion_message, CompletionTracker};
pub use types::{CounterState, IngestReport, ReviewReference};
