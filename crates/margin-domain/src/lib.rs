//! Margin Domain Layer
//!
//! This crate contains the data model and the pure decision logic of the
//! human-review pipeline. It performs no I/O: storage, notification and
//! tracking are reached through the trait interfaces in [`traits`], with
//! implementations living in other crates.
//!
//! ## Key Concepts
//!
//! - **Extraction element**: one recognized unit of a page (word, table, cell,
//!   form field, signature or a page-boundary marker) with its confidence
//! - **Shard**: one numbered fragment of a paginated extraction result
//! - **Page group**: every element belonging to one physical page
//! - **Confidence policy**: decides whether a page needs human review
//! - **Review task**: one flagged page submitted to the review service
//! - **Tracking record**: per-job count of review tasks still outstanding
//!
//! ## Architecture
//!
//! - Depends only on `serde`, `serde_json` and `uuid`
//! - Pure business logic only
//! - Trait definitions for all external interactions

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod confidence;
pub mod element;
pub mod event;
pub mod location;
pub mod page;
pub mod review;
pub mod shard;
pub mod tracking;
pub mod traits;

// Re-exports for convenience
pub use confidence::{is_low_confidence, ConfidencePolicy, ConfidenceScope};
pub use element::{ElementKind, ExtractionElement};
pub use event::{
    DocumentLocation, ExtractionCompleted, InboundEvent, ReviewCompleted, ReviewPayload,
};
pub use location::ObjectLocation;
pub use page::PageGroup;
pub use review::{PageArtifact, ReviewConfiguration, ReviewTask, TaskId};
pub use shard::{DocumentMetadata, ExtractionShard};
pub use tracking::{DecrementOutcome, JobTrackingRecord};
pub use traits::{Notification, Notifier, ObjectStore, TrackingStore};
