//! Margin Splitter
//!
//! Turns a completed extraction job into human review tasks.
//!
//! # Overview
//!
//! The extraction service writes its result as numbered shards. The splitter
//! re-segments those shards into pages, writes a self-contained result for
//! every page, runs the confidence gate, extracts a single-page artifact for
//! each flagged page and publishes one review task per artifact. The number
//! of published tasks is recorded so the tracker can tell when review is done.
//!
//! # Architecture
//!
//! ```text
//! ExtractionCompleted → Splitter → PageSegmenter → ConfidencePolicy
//!                                → PageExtractor → ReviewDispatcher
//! ```
//!
//! A failure on one page (result write, extraction, publish) is recorded in
//! the [`SplitReport`] and never stops the other pages.
//!
//! # Example Usage
//!
//! ```no_run
//! use margin_domain::{DocumentLocation, ExtractionCompleted};
//! use margin_splitter::{SplitOutcome, Splitter, SplitterConfig};
//! use margin_store::{FsObjectStore, OutboxNotifier, SqliteTrackingStore};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let splitter = Splitter::new(
//!     FsObjectStore::new("/var/lib/margin/objects"),
//!     OutboxNotifier::new("/var/lib/margin/outbox"),
//!     SqliteTrackingStore::new("/var/lib/margin/tracking.db")?,
//!     SplitterConfig::default(),
//! )?;
//!
//! let event = ExtractionCompleted {
//!     job_id: "job-1".to_string(),
//!     status: "SUCCEEDED".to_string(),
//!     document_location: DocumentLocation {
//!         bucket: "documents".to_string(),
//!         object_name: "forms/intake.pdf".to_string(),
//!     },
//! };
//!
//! if let SplitOutcome::Processed(report) = splitter.process(&event)? {
//!     println!("Flagged pages: {:?}", report.pages_flagged);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod dispatcher;
mod error;
mod extractor;
mod segmenter;
mod splitter;
mod types;


pub use config::{ShardReadPolicy, SplitterConfig};
pub use dispatcher::ReviewDispatcher;
pub use error::{DispatchError, ExtractError, SegmentError, SplitterError};
pub use extractor::{DocumentFormat, PageExtractor};
pub use segmenter::PageSegmenter;
pub use splitter::Splitter;
pub use types::{
    DispatchReport, PageFailure, PageStage, SplitOutcome, SplitReport, TrackingOutcome,
};
