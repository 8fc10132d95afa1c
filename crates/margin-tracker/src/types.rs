//! Types produced by review ingestion

use margin_domain::{DecrementOutcome, ObjectLocation};
use serde::Serialize;

/// What a review-completed event refers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewReference {
    /// Extraction job the reviewed page belongs to
    pub job_id: String,

    /// Single-page artifact that was shown to the reviewer
    pub artifact: ObjectLocation,
}

/// Counter state observed while completing one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CounterState {
    /// Counter decremented; pages still outstanding
    Remaining {
        /// Outstanding pages after the decrement
        count: u32,
    },
    /// Counter was already zero
    AlreadyComplete,
    /// Page was counted by an earlier delivery; counter untouched
    AlreadyCounted,
    /// No record exists for the job
    NotTracked,
    /// Tracking store failed; the job is treated as still outstanding
    Unknown {
        /// Tracking store error
        reason: String,
    },
}

impl From<DecrementOutcome> for CounterState {
    fn from(outcome: DecrementOutcome) -> Self {
        match outcome {
            DecrementOutcome::Remaining(count) => CounterState::Remaining { count },
            DecrementOutcome::AlreadyComplete => CounterState::AlreadyComplete,
            DecrementOutcome::AlreadyCounted => CounterState::AlreadyCounted,
            DecrementOutcome::NotTracked => CounterState::NotTracked,
        }
    }
}

/// Result of completing one reviewed page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Extraction job id
    pub job_id: String,

    /// Artifact that was (or should have been) deleted
    pub artifact: ObjectLocation,

    /// Counter state after the decrement
    pub counter: CounterState,

    /// Whether the artifact was deleted
    pub artifact_deleted: bool,

    /// Whether this page completed the job and the notification went out
    pub completion_published: bool,

    /// Completion notification error, if publishing failed
    pub notify_error: Option<String>,
}

impl IngestReport {
    /// Whether this page was the one that brought the count to zero
    pub fn completed_job(&self) -> bool {
        matches!(self.counter, CounterState::Remaining { count: 0 })
    }

    /// Outstanding pages after this one, if known
    pub fn remaining(&self) -> Option<u32> {
        match self.counter {
            CounterState::Remaining { count } => Some(count),
            CounterState::AlreadyComplete => Some(0),
            CounterState::AlreadyCounted | CounterState::NotTracked | CounterState::Unknown { .. } => {
                None
            }
        }
    }
}
