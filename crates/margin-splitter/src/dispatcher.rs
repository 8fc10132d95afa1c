//! Review task fan-out

use crate::error::DispatchError;
use crate::types::{DispatchReport, TrackingOutcome};
use margin_domain::traits::{Notification, Notifier, TrackingStore};
use margin_domain::{JobTrackingRecord, ReviewTask};
use std::fmt::Display;
use tracing::{error, info, warn};

/// Publishes review tasks and records how many are outstanding
///
/// Publishing is best-effort: a failed publish is logged and reported, and
/// the remaining tasks are still sent. The tracking record counts only the
/// tasks that were actually published. A job that already has a record is
/// not published again.
pub struct ReviewDispatcher<N, T> {
    notifier: N,
    tracking: T,
    topic: String,
}

impl<N, T> ReviewDispatcher<N, T>
where
    N: Notifier,
    N::Error: Display,
    T: TrackingStore,
    T::Error: Display,
{
    /// Create a dispatcher publishing to `topic`
    pub fn new(notifier: N, tracking: T, topic: impl Into<String>) -> Self {
        Self {
            notifier,
            tracking,
            topic: topic.into(),
        }
    }

    /// Topic tasks are published to
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Existing tracking record of a job
    ///
    /// A tracking store error is logged and treated as "not tracked".
    pub fn tracked(&self, job_id: &str) -> Option<JobTrackingRecord> {
        match self.tracking.get(job_id) {
            Ok(record) => record,
            Err(e) => {
                warn!(job_id, error = %e, "could not look up tracking record");
                None
            }
        }
    }

    /// Publish every task, then create the job's tracking record
    ///
    /// All tasks must belong to one job. An empty batch publishes nothing and
    /// creates no record; neither does a batch for a job already tracked.
    pub fn dispatch(&self, tasks: &[ReviewTask]) -> Result<DispatchReport, DispatchError> {
        let first = match tasks.first() {
            Some(task) => task,
            None => {
                info!("no pages flagged, nothing to dispatch");
                return Ok(DispatchReport::empty());
            }
        };
        if let Some(other) = tasks.iter().find(|t| t.job_id != first.job_id) {
            return Err(DispatchError::MixedJobs {
                first: first.job_id.clone(),
                other: other.job_id.clone(),
            });
        }

        let mut report = DispatchReport {
            job_id: Some(first.job_id.clone()),
            ..DispatchReport::empty()
        };

        if let Some(existing) = self.tracked(&first.job_id) {
            warn!(
                job_id = %first.job_id,
                pages_outstanding = existing.pages_sent,
                "job already tracked, not publishing again"
            );
            report.tracking = TrackingOutcome::AlreadyTracked {
                pages_outstanding: existing.pages_sent,
            };
            return Ok(report);
        }

        for task in tasks {
            match self.publish(task) {
                Ok(()) => {
                    info!(
                        job_id = %task.job_id,
                        page = task.page_number(),
                        task_id = %task.task_id,
                        "review task published"
                    );
                    report.dispatched.push(task.task_id);
                }
                Err(reason) => {
                    error!(
                        job_id = %task.job_id,
                        page = task.page_number(),
                        task_id = %task.task_id,
                        error = %reason,
                        "failed to publish review task"
                    );
                    report.failed.push(task.task_id);
                }
            }
        }

        let pages_sent = report.dispatched.len() as u32;
        report.tracking = if pages_sent == 0 {
            warn!(job_id = %first.job_id, "every publish failed, job left untracked");
            TrackingOutcome::Skipped
        } else {
            match self
                .tracking
                .create(&JobTrackingRecord::new(first.job_id.clone(), pages_sent))
            {
                Ok(()) => {
                    info!(job_id = %first.job_id, pages_sent, "tracking record created");
                    TrackingOutcome::Recorded { pages_sent }
                }
                Err(e) => {
                    error!(job_id = %first.job_id, error = %e, "failed to create tracking record");
                    TrackingOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            }
        };

        Ok(report)
    }

    fn publish(&self, task: &ReviewTask) -> Result<(), String> {
        let body = serde_json::to_string(task).map_err(|e| e.to_string())?;
        self.notifier
            .publish(&self.topic, &Notification::new(body))
            .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use margin_domain::PageArtifact;
    use margin_store::{MemoryNotifier, MemoryTrackingStore};

    fn task(job_id: &str, page: u32) -> ReviewTask {
        let artifact = PageArtifact {
            source: format!("Review document form.pdf page number {}", page),
            file_extension: ".pdf".to_string(),
            input_prefix: format!("s3://out/{}/pages/{}", job_id, page),
            output_prefix: format!("s3://out/{}/pages/{}", job_id, page),
            artifact_uri: format!("s3://out/{}/pages/{}/page/{}.pdf", job_id, page, page),
            page_number: page,
            page_count: 1,
        };
        ReviewTask::new(job_id, "s3://in/form.pdf", artifact, 80.0)
    }

    #[test]
    fn test_empty_batch_creates_nothing() {
        let notifier = MemoryNotifier::new();
        let tracking = MemoryTrackingStore::new();
        let dispatcher = ReviewDispatcher::new(notifier.clone(), tracking.clone(), "review");

        let report = dispatcher.dispatch(&[]).unwrap();

        assert_eq!(report, DispatchReport::empty());
        assert!(notifier.published().is_empty());
        assert_eq!(tracking.get("job-1").unwrap(), None);
    }

    #[test]
    fn test_all_published_and_tracked() {
        let notifier = MemoryNotifier::new();
        let tracking = MemoryTrackingStore::new();
        let dispatcher = ReviewDispatcher::new(notifier.clone(), tracking.clone(), "review");
        let tasks = vec![task("job-1", 1), task("job-1", 3)];

        let report = dispatcher.dispatch(&tasks).unwrap();

        assert_eq!(report.dispatched.len(), 2);
        assert_eq!(report.tracking, TrackingOutcome::Recorded { pages_sent: 2 });
        assert_eq!(tracking.get("job-1").unwrap().unwrap().pages_sent, 2);

        let published = notifier.published_to("review");
        let body: serde_json::Value = serde_json::from_str(&published[1].body).unwrap();
        assert_eq!(body["currPageNumber"], 3);
        assert_eq!(body["textractJobId"], "job-1");
    }

    #[test]
    fn test_partial_failure_counts_successes_only() {
        let notifier = MemoryNotifier::failing_when(|_, m| m.body.contains("\"currPageNumber\":2"));
        let tracking = MemoryTrackingStore::new();
        let dispatcher = ReviewDispatcher::new(notifier.clone(), tracking.clone(), "review");
        let tasks = vec![task("job-1", 1), task("job-1", 2), task("job-1", 3)];

        let report = dispatcher.dispatch(&tasks).unwrap();

        assert_eq!(report.failed, vec![tasks[1].task_id]);
        assert_eq!(report.dispatched, vec![tasks[0].task_id, tasks[2].task_id]);
        assert_eq!(report.attempted(), 3);
        assert_eq!(tracking.get("job-1").unwrap().unwrap().pages_sent, 2);
    }

    #[test]
    fn test_all_failed_leaves_job_untracked() {
        let notifier = MemoryNotifier::failing_when(|_, _| true);
        let tracking = MemoryTrackingStore::new();
        let dispatcher = ReviewDispatcher::new(notifier, tracking.clone(), "review");

        let report = dispatcher.dispatch(&[task("job-1", 1)]).unwrap();

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.tracking, TrackingOutcome::Skipped);
        assert_eq!(tracking.get("job-1").unwrap(), None);
    }

    #[test]
    fn test_tracking_failure_is_reported() {
        let tracking = MemoryTrackingStore::new();
        tracking.fail_all();
        let dispatcher = ReviewDispatcher::new(MemoryNotifier::new(), tracking, "review");

        let report = dispatcher.dispatch(&[task("job-1", 1)]).unwrap();

        assert_eq!(report.dispatched.len(), 1);
        assert!(matches!(report.tracking, TrackingOutcome::Failed { .. }));
    }

    #[test]
    fn test_tracked_job_is_not_published_again() {
        let notifier = MemoryNotifier::new();
        let tracking = MemoryTrackingStore::new();
        let dispatcher = ReviewDispatcher::new(notifier.clone(), tracking.clone(), "review");
        let tasks = vec![task("job-1", 1), task("job-1", 2)];

        dispatcher.dispatch(&tasks).unwrap();
        let again = dispatcher.dispatch(&tasks).unwrap();

        assert!(again.dispatched.is_empty());
        assert!(again.failed.is_empty());
        assert_eq!(again.tracking, TrackingOutcome::AlreadyTracked { pages_outstanding: 2 });
        assert_eq!(notifier.published_to("review").len(), 2);
        assert_eq!(tracking.get("job-1").unwrap().unwrap().pages_sent, 2);
    }

    #[test]
    fn test_mixed_jobs_rejected_before_publishing() {
        let notifier = MemoryNotifier::new();
        let dispatcher = ReviewDispatcher::new(notifier.clone(), MemoryTrackingStore::new(), "review");

        let err = dispatcher
            .dispatch(&[task("job-1", 1), task("job-2", 1)])
            .unwrap_err();

        assert!(matches!(err, DispatchError::MixedJobs { .. }));
        assert!(notifier.published().is_empty());
    }
}
