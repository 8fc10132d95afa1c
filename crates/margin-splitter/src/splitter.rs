//! Extraction-completed workflow
//!
//! ```text
//! shards → PageSegmenter → per-page result → ConfidencePolicy
//!        → PageExtractor (flagged only) → ReviewDispatcher
//! ```

use crate::config::SplitterConfig;
use crate::dispatcher::ReviewDispatcher;
use crate::error::SplitterError;
use crate::extractor::PageExtractor;
use crate::segmenter::PageSegmenter;
use crate::types::{PageFailure, PageStage, SplitOutcome, SplitReport};
use margin_domain::location::{job_prefix, page_result_key};
use margin_domain::traits::{Notifier, ObjectStore, TrackingStore};
use margin_domain::{
    ConfidencePolicy, ExtractionCompleted, ExtractionShard, ObjectLocation, PageGroup, ReviewTask,
};
use std::fmt::Display;
use tracing::{error, info, warn};

/// Splits a completed extraction job into per-page review tasks
pub struct Splitter<S, N, T> {
    store: S,
    extractor: PageExtractor<S>,
    dispatcher: ReviewDispatcher<N, T>,
    policy: ConfidencePolicy,
    config: SplitterConfig,
}

/// Per-page accumulation during one run
#[derive(Default)]
struct RunState {
    pages_seen: u32,
    pages_flagged: Vec<u32>,
    failures: Vec<PageFailure>,
    tasks: Vec<ReviewTask>,
}

impl<S, N, T> Splitter<S, N, T>
where
    S: ObjectStore + Clone,
    S::Error: Display,
    N: Notifier,
    N::Error: Display,
    T: TrackingStore,
    T::Error: Display,
{
    /// Create a new Splitter
    pub fn new(
        store: S,
        notifier: N,
        tracking: T,
        config: SplitterConfig,
    ) -> Result<Self, SplitterError> {
        config.validate().map_err(SplitterError::Config)?;
        let policy =
            ConfidencePolicy::new(config.confidence_threshold).map_err(SplitterError::Config)?;
        let extractor = PageExtractor::new(store.clone(), config.output_bucket.clone())
            .with_scratch_dir(config.scratch_dir.clone());
        let dispatcher = ReviewDispatcher::new(notifier, tracking, config.review_topic.clone());

        Ok(Self {
            store,
            extractor,
            dispatcher,
            policy,
            config,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    /// Handle one extraction-completed event
    pub fn process(&self, event: &ExtractionCompleted) -> Result<SplitOutcome, SplitterError> {
        if event.job_id.trim().is_empty() {
            return Err(SplitterError::MalformedEvent("missing JobId".to_string()));
        }
        if !event.succeeded() {
            info!(job_id = %event.job_id, status = %event.status, "extraction did not succeed, skipping");
            return Ok(SplitOutcome::Skipped {
                job_id: event.job_id.clone(),
                status: event.status.clone(),
            });
        }

        if let Some(existing) = self.dispatcher.tracked(&event.job_id) {
            warn!(
                job_id = %event.job_id,
                pages_outstanding = existing.pages_sent,
                "job already dispatched, skipping redelivered event"
            );
            return Ok(SplitOutcome::AlreadyTracked {
                job_id: event.job_id.clone(),
                pages_outstanding: existing.pages_sent,
            });
        }

        let source = event.document_location.to_location();
        let prefix = job_prefix(self.config.normalized_prefix(), &event.job_id);
        info!(job_id = %event.job_id, source = %source, prefix = %prefix, "splitting extraction result");

        let mut state = RunState::default();
        let mut stream_error = None;
        let mut segmenter = PageSegmenter::new(
            &self.store,
            self.config.output_bucket.clone(),
            prefix.clone(),
            self.config.shard_read_policy,
        );

        while let Some(item) = segmenter.next() {
            match item {
                Ok(page) => {
                    self.process_page(&event.job_id, &source, &prefix, segmenter.envelope(), &page, &mut state)
                }
                Err(e) => {
                    error!(job_id = %event.job_id, error = %e, "shard stream failed");
                    stream_error = Some(e.to_string());
                }
            }
        }

        let dispatch = self.dispatcher.dispatch(&state.tasks)?;
        let report = SplitReport {
            job_id: event.job_id.clone(),
            pages_seen: state.pages_seen,
            pages_flagged: state.pages_flagged,
            failures: state.failures,
            dispatch,
            stream_error,
        };
        info!(
            job_id = %report.job_id,
            pages = report.pages_seen,
            flagged = report.pages_flagged.len(),
            dispatched = report.dispatch.dispatched.len(),
            "split complete"
        );
        Ok(SplitOutcome::Processed(report))
    }

    fn process_page(
        &self,
        job_id: &str,
        source: &ObjectLocation,
        prefix: &str,
        envelope: Option<&ExtractionShard>,
        page: &PageGroup,
        state: &mut RunState,
    ) {
        let number = page.page_number;
        state.pages_seen += 1;

        if let Err(reason) = self.write_page_result(prefix, envelope, page) {
            warn!(job_id, page = number, error = %reason, "failed to write page result");
            state.failures.push(PageFailure {
                page: number,
                stage: PageStage::WriteResult,
                reason,
            });
        }

        if !self.policy.requires_review(page) {
            return;
        }
        info!(job_id, page = number, "low confidence, page flagged for review");
        state.pages_flagged.push(number);

        match self.extractor.extract_page(source, prefix, number) {
            Ok(artifact) => {
                let task = ReviewTask::new(job_id, source.to_string(), artifact, self.policy.threshold())
                    .with_kms_key(self.config.kms_key_id.clone());
                state.tasks.push(task);
            }
            Err(e) => {
                error!(job_id, page = number, error = %e, "page extraction failed");
                state.failures.push(PageFailure {
                    page: number,
                    stage: PageStage::Extract,
                    reason: e.to_string(),
                });
            }
        }
    }

    fn write_page_result(
        &self,
        prefix: &str,
        envelope: Option<&ExtractionShard>,
        page: &PageGroup,
    ) -> Result<(), String> {
        let envelope = envelope.ok_or_else(|| "no shard envelope available".to_string())?;
        let body = serde_json::to_vec(&envelope.for_page(page)).map_err(|e| e.to_string())?;
        self.store
            .put(
                &self.config.output_bucket,
                &page_result_key(prefix, page.page_number),
                &body,
                "application/json",
            )
            .map_err(|e| e.to_string())
    }
}
