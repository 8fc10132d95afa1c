//! Error types for the CLI application.

use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Store(#[from] margin_store::StoreError),

    /// Split run error
    #[error("Split failed: {0}")]
    Splitter(#[from] margin_splitter::SplitterError),

    /// Review ingestion error
    #[error("Ingest failed: {0}")]
    Tracker(#[from] margin_tracker::TrackerError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No tracking record for a job
    #[error("Job '{0}' is not tracked")]
    NotTracked(String),
}
