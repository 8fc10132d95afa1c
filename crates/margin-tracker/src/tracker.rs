//! Per-job completion tracking

use crate::config::{TrackerConfig, COMPLETION_SUBJECT};
use crate::error::TrackerError;
use crate::types::{CounterState, IngestReport};
use margin_domain::traits::{Notification, Notifier, ObjectStore, TrackingStore};
use margin_domain::ObjectLocation;
use std::fmt::Display;
use tracing::{debug, error, info, warn};

/// Body of the job-complete notification
pub fn completion_message(job_id: &str) -> String {
    format!("Job {} has completed reviewing all sent pages.", job_id)
}

/// Counts reviewed pages down and announces when a job is done
///
/// Every call to [`complete_page`](Self::complete_page) performs one atomic
/// decrement keyed by the page's artifact, so a redelivered completion of a
/// page already counted leaves the counter alone. Only the call that observes
/// the transition to zero publishes, so concurrent completions of the same
/// job notify exactly once.
pub struct CompletionTracker<S, N, T> {
    store: S,
    notifier: N,
    tracking: T,
    config: TrackerConfig,
}

impl<S, N, T> CompletionTracker<S, N, T>
where
    S: ObjectStore,
    S::Error: Display,
    N: Notifier,
    N::Error: Display,
    T: TrackingStore,
    T::Error: Display,
{
    /// Create a new tracker
    pub fn new(store: S, notifier: N, tracking: T, config: TrackerConfig) -> Result<Self, TrackerError> {
        config.validate().map_err(TrackerError::Config)?;
        Ok(Self {
            store,
            notifier,
            tracking,
            config,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Object store the tracker deletes artifacts from
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Record one reviewed page of `job_id`
    ///
    /// Order: decrement, delete the artifact, then notify if this page was
    /// the last one. A tracking failure is reported as [`CounterState::Unknown`]
    /// and never triggers the notification; the artifact is still deleted.
    pub fn complete_page(&self, job_id: &str, artifact: &ObjectLocation) -> IngestReport {
        let page_key = artifact.to_string();
        let counter = match self.tracking.decrement(job_id, &page_key) {
            Ok(outcome) => CounterState::from(outcome),
            Err(e) => {
                error!(job_id, error = %e, "failed to decrement outstanding pages");
                CounterState::Unknown {
                    reason: e.to_string(),
                }
            }
        };
        match &counter {
            CounterState::Remaining { count } => info!(job_id, remaining = count, "page review recorded"),
            CounterState::AlreadyComplete => warn!(job_id, "job already complete, counter left at zero"),
            CounterState::AlreadyCounted => {
                warn!(job_id, artifact = %artifact, "page already counted, ignoring redelivery")
            }
            CounterState::NotTracked => warn!(job_id, "no tracking record for job"),
            CounterState::Unknown { .. } => {}
        }

        let artifact_deleted = self.delete_artifact(job_id, artifact);

        let mut report = IngestReport {
            job_id: job_id.to_string(),
            artifact: artifact.clone(),
            counter,
            artifact_deleted,
            completion_published: false,
            notify_error: None,
        };

        if report.completed_job() {
            match self.publish_completion(job_id) {
                Ok(()) => {
                    info!(job_id, topic = %self.config.job_complete_topic, "job complete notification published");
                    report.completion_published = true;
                }
                Err(reason) => {
                    error!(job_id, error = %reason, "failed to publish job complete notification");
                    report.notify_error = Some(reason);
                }
            }
        }

        report
    }

    fn delete_artifact(&self, job_id: &str, artifact: &ObjectLocation) -> bool {
        if !self.config.delete_artifacts {
            debug!(job_id, artifact = %artifact, "artifact deletion disabled");
            return false;
        }
        match self.store.delete(&artifact.bucket, &artifact.key) {
            Ok(()) => {
                info!(job_id, artifact = %artifact, "page artifact deleted");
                true
            }
            Err(e) => {
                error!(job_id, artifact = %artifact, error = %e, "failed to delete page artifact");
                false
            }
        }
    }

    fn publish_completion(&self, job_id: &str) -> Result<(), String> {
        let message = Notification::new(completion_message(job_id)).with_subject(COMPLETION_SUBJECT);
        self.notifier
            .publish(&self.config.job_complete_topic, &message)
            .map_err(|e| e.to_string())
    }
}
