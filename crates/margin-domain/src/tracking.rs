//! Job tracking - outstanding review pages per extraction job

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// One row per extraction job with review pages outstanding
///
/// `pages_sent` only ever decreases after creation; reaching zero is the
/// unique trigger for the completion notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTrackingRecord {
    /// Extraction job id
    pub job_id: String,

    /// Review tasks not yet completed
    pub pages_sent: u32,

    /// Creation time, seconds since Unix epoch
    pub date_sent: u64,
}

impl JobTrackingRecord {
    /// Create a record stamped with the current time
    pub fn new(job_id: impl Into<String>, pages_sent: u32) -> Self {
        let date_sent = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            job_id: job_id.into(),
            pages_sent,
            date_sent,
        }
    }

    /// Whether every page has been reviewed
    pub fn is_complete(&self) -> bool {
        self.pages_sent == 0
    }
}

/// Result of an atomic decrement of the outstanding-page counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "remaining", rename_all = "snake_case")]
pub enum DecrementOutcome {
    /// The counter was decremented; pages still outstanding afterwards
    Remaining(u32),

    /// The counter was already zero and was left untouched
    AlreadyComplete,

    /// This page was counted by an earlier delivery; counter untouched
    AlreadyCounted,

    /// No record exists for the job
    NotTracked,
}

impl DecrementOutcome {
    /// Whether this decrement was the one that completed the job
    ///
    /// Exactly one decrement per job can observe this.
    pub fn completed_job(&self) -> bool {
        matches!(self, DecrementOutcome::Remaining(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record() {
        let record = JobTrackingRecord::new("job-1", 3);
        assert_eq!(record.pages_sent, 3);
        assert!(record.date_sent > 0);
        assert!(!record.is_complete());
    }

    #[test]
    fn test_completed_job_only_on_zero_transition() {
        assert!(DecrementOutcome::Remaining(0).completed_job());
        assert!(!DecrementOutcome::Remaining(1).completed_job());
        assert!(!DecrementOutcome::AlreadyComplete.completed_job());
        assert!(!DecrementOutcome::NotTracked.completed_job());
        assert!(!DecrementOutcome::AlreadyCounted.completed_job());
    }
}
