//! Counters over ingested review completions

use crate::types::{CounterState, IngestReport};
use std::collections::BTreeSet;

/// Running totals over many [`IngestReport`]s
///
/// Kept by long-running callers such as the event worker.
#[derive(Debug, Clone, Default)]
pub struct TrackerMetrics {
    /// Reviewed pages recorded
    pub pages_ingested: usize,

    /// Events that could not be resolved
    pub rejected: usize,

    /// Artifacts deleted
    pub artifacts_deleted: usize,

    /// Decrements that hit a missing or already-complete record
    pub stray_completions: usize,

    /// Redelivered completions of pages already counted
    pub duplicate_completions: usize,

    /// Decrements that failed in the tracking store
    pub tracking_failures: usize,

    /// Jobs whose completion notification went out
    pub completed_jobs: BTreeSet<String>,

    /// Completion notifications that failed to publish
    pub notify_failures: usize,
}

impl TrackerMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one report into the totals
    pub fn record(&mut self, report: &IngestReport) {
        self.pages_ingested += 1;
        if report.artifact_deleted {
            self.artifacts_deleted += 1;
        }
        match report.counter {
            CounterState::AlreadyComplete | CounterState::NotTracked => self.stray_completions += 1,
            CounterState::AlreadyCounted => self.duplicate_completions += 1,
            CounterState::Unknown { .. } => self.tracking_failures += 1,
            CounterState::Remaining { .. } => {}
        }
        if report.completion_published {
            self.completed_jobs.insert(report.job_id.clone());
        }
        if report.notify_error.is_some() {
            self.notify_failures += 1;
        }
    }

    /// Count an event that failed to resolve
    pub fn record_rejected(&mut self) {
        self.rejected += 1;
    }

    /// Reset all metrics
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Review Ingestion Summary".to_string(),
            "========================".to_string(),
            format!("Pages ingested: {}", self.pages_ingested),
            format!("Events rejected: {}", self.rejected),
            format!("Artifacts deleted: {}", self.artifacts_deleted),
            format!("Jobs completed: {}", self.completed_jobs.len()),
        ];
        if self.stray_completions > 0 {
            lines.push(format!("Stray completions: {}", self.stray_completions));
        }
        if self.duplicate_completions > 0 {
            lines.push(format!("Duplicate completions: {}", self.duplicate_completions));
        }
        if self.tracking_failures > 0 {
            lines.push(format!("Tracking failures: {}", self.tracking_failures));
        }
        if self.notify_failures > 0 {
            lines.push(format!("Notification failures: {}", self.notify_failures));
        }
        lines.join("\n")
    }
}
