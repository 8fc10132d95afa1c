//! Error types for review ingestion

use thiserror::Error;

/// Errors that abort ingestion of one review-completed event
///
/// Nothing has been decremented, deleted or published when one of these is
/// returned.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// Event or consolidation request is missing required fields
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// An object the event refers to could not be read
    #[error("Storage error: {0}")]
    Store(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
