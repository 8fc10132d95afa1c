//! Error types for the Splitter

use thiserror::Error;

/// Errors that end a split run
#[derive(Error, Debug)]
pub enum SplitterError {
    /// Event is missing required fields
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// Dispatch could not run
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors raised while streaming shards
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SegmentError {
    /// Shard exists but could not be read
    #[error("Failed to read shard {index}: {reason}")]
    Read {
        /// Shard number
        index: u32,
        /// Underlying store error
        reason: String,
    },

    /// Shard was read but is not a valid extraction result
    #[error("Malformed shard {index}: {reason}")]
    MalformedShard {
        /// Shard number
        index: u32,
        /// Parse error
        reason: String,
    },
}

/// Errors extracting a single page
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Source document does not exist
    #[error("Source document not found: {0}")]
    SourceMissing(String),

    /// Object store error
    #[error("Store error: {0}")]
    Store(String),

    /// Detected format is not one we can split
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// Requested page does not exist in the document
    #[error("Page {page} out of range (document has {available})")]
    PageOutOfRange {
        /// Requested page
        page: u32,
        /// Pages (or frames) in the document
        available: u32,
    },

    /// PDF could not be processed
    #[error("PDF error: {0}")]
    Pdf(String),

    /// TIFF could not be processed
    #[error("TIFF error: {0}")]
    Tiff(String),

    /// Scratch file error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<lopdf::Error> for ExtractError {
    fn from(e: lopdf::Error) -> Self {
        ExtractError::Pdf(e.to_string())
    }
}

impl From<tiff::TiffError> for ExtractError {
    fn from(e: tiff::TiffError) -> Self {
        ExtractError::Tiff(e.to_string())
    }
}

impl From<image::ImageError> for ExtractError {
    fn from(e: image::ImageError) -> Self {
        ExtractError::Tiff(e.to_string())
    }
}

/// Errors that prevent a dispatch from running at all
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Tasks in one batch must share a job id
    #[error("Tasks span several jobs: {first} and {other}")]
    MixedJobs {
        /// Job id of the first task
        first: String,
        /// First differing job id
        other: String,
    },
}
