//! Report types for split and dispatch runs

use margin_domain::TaskId;
use serde::Serialize;

/// What happened to the tracking record of a dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrackingOutcome {
    /// Record created with this many outstanding pages
    Recorded {
        /// Initial outstanding count
        pages_sent: u32,
    },
    /// Nothing was dispatched, so nothing is tracked
    Skipped,
    /// Job already had a record; nothing was published
    AlreadyTracked {
        /// Outstanding count of the existing record
        pages_outstanding: u32,
    },
    /// Record could not be written
    Failed {
        /// Tracking store error
        reason: String,
    },
}

/// Result of publishing one batch of review tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Job the batch belongs to (None for an empty batch)
    pub job_id: Option<String>,

    /// Tasks published successfully
    pub dispatched: Vec<TaskId>,

    /// Tasks whose publish failed
    pub failed: Vec<TaskId>,

    /// Tracking record outcome
    pub tracking: TrackingOutcome,
}

impl DispatchReport {
    /// Report for an empty batch
    pub fn empty() -> Self {
        Self {
            job_id: None,
            dispatched: Vec::new(),
            failed: Vec::new(),
            tracking: TrackingOutcome::Skipped,
        }
    }

    /// Tasks attempted
    pub fn attempted(&self) -> usize {
        self.dispatched.len() + self.failed.len()
    }
}

/// Stage of per-page processing that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStage {
    /// Writing the per-page extraction result
    WriteResult,
    /// Extracting the page artifact
    Extract,
}

/// A failure confined to one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageFailure {
    /// Page number
    pub page: u32,

    /// Failed stage
    pub stage: PageStage,

    /// Error message
    pub reason: String,
}

/// Summary of one split run over a completed extraction job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitReport {
    /// Extraction job id
    pub job_id: String,

    /// Pages emitted by the segmenter
    pub pages_seen: u32,

    /// Pages that failed the confidence gate
    pub pages_flagged: Vec<u32>,

    /// Per-page failures; sibling pages were still processed
    pub failures: Vec<PageFailure>,

    /// Review task dispatch result
    pub dispatch: DispatchReport,

    /// Shard stream error that cut segmentation short, if any
    pub stream_error: Option<String>,
}

impl SplitReport {
    /// Whether every page was processed without error
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.stream_error.is_none() && self.dispatch.failed.is_empty()
    }
}

/// Outcome of handling an extraction-completed event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SplitOutcome {
    /// Job did not succeed; nothing was done
    Skipped {
        /// Extraction job id
        job_id: String,
        /// Reported job status
        status: String,
    },
    /// Job was split and flagged pages dispatched
    Processed(SplitReport),
    /// Job was dispatched by an earlier delivery of the same event
    AlreadyTracked {
        /// Extraction job id
        job_id: String,
        /// Review tasks still outstanding
        pages_outstanding: u32,
    },
}
