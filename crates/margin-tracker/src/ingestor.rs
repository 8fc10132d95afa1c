//! Review-completed event handling
//!
//! The review service calls back with the location of a consolidation
//! request. Resolving it to a job id and an artifact takes two reads:
//!
//! ```text
//! payload.s3Uri ─► consolidation request
//!                  [0].annotations[0].annotationData.content  (JSON string)
//!                    answerPrefix/answerFiles[0] ─► answer object ─► JobId
//!                    inputPrefix/page/inputFiles[0]            ─► page artifact
//! ```

use crate::error::TrackerError;
use crate::tracker::CompletionTracker;
use crate::types::{IngestReport, ReviewReference};
use margin_domain::traits::{Notifier, ObjectStore, TrackingStore};
use margin_domain::{ObjectLocation, ReviewCompleted};
use serde::Deserialize;
use serde_json::Value;
use std::fmt::Display;
use tracing::{debug, error, info};

/// File listing carried in the annotation content
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotationManifest {
    #[serde(default)]
    answer_files: Vec<String>,
    answer_prefix: String,
    #[serde(default)]
    input_files: Vec<String>,
    input_prefix: String,
}

fn malformed(reason: impl Into<String>) -> TrackerError {
    TrackerError::MalformedEvent(reason.into())
}

/// Join a prefix (URI or bare key) and a relative path
fn join_key(prefix: &str, path: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Extract the annotation manifest from a consolidation request body
fn parse_request(body: &[u8]) -> Result<AnnotationManifest, TrackerError> {
    let request: Value = serde_json::from_slice(body)
        .map_err(|e| malformed(format!("consolidation request is not JSON: {}", e)))?;
    let content = request
        .pointer("/0/annotations/0/annotationData/content")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("consolidation request has no annotation content"))?;
    serde_json::from_str(content)
        .map_err(|e| malformed(format!("annotation content is not a file manifest: {}", e)))
}

/// Handles review-completed events end to end
pub struct ReviewIngestor<S, N, T> {
    tracker: CompletionTracker<S, N, T>,
}

impl<S, N, T> ReviewIngestor<S, N, T>
where
    S: ObjectStore,
    S::Error: Display,
    N: Notifier,
    N::Error: Display,
    T: TrackingStore,
    T::Error: Display,
{
    /// Create an ingestor around `tracker`
    pub fn new(tracker: CompletionTracker<S, N, T>) -> Self {
        Self { tracker }
    }

    /// Underlying tracker
    pub fn tracker(&self) -> &CompletionTracker<S, N, T> {
        &self.tracker
    }

    /// Work out which job and artifact an event refers to
    ///
    /// Reads only; nothing is modified.
    pub fn resolve(&self, event: &ReviewCompleted) -> Result<ReviewReference, TrackerError> {
        let request = event.request_location().map_err(malformed)?;
        let body = self.read(&request)?;
        let manifest = parse_request(&body)?;

        let answer_file = manifest
            .answer_files
            .first()
            .ok_or_else(|| malformed("annotation content lists no answer files"))?;
        let input_file = manifest
            .input_files
            .first()
            .ok_or_else(|| malformed("annotation content lists no input files"))?;

        let answer = ObjectLocation::resolve(&join_key(&manifest.answer_prefix, answer_file), &request.bucket)
            .map_err(malformed)?;
        let artifact = ObjectLocation::resolve(
            &join_key(&join_key(&manifest.input_prefix, "page"), input_file),
            &request.bucket,
        )
        .map_err(malformed)?;
        debug!(request = %request, answer = %answer, artifact = %artifact, "consolidation request resolved");

        let answer_body = self.read(&answer)?;
        let answer_doc: Value = serde_json::from_slice(&answer_body)
            .map_err(|e| malformed(format!("answer object is not JSON: {}", e)))?;
        let job_id = answer_doc
            .get("JobId")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| malformed(format!("no JobId in answer object {}", answer)))?;

        Ok(ReviewReference {
            job_id: job_id.to_string(),
            artifact,
        })
    }

    /// Resolve the event and record the reviewed page
    pub fn ingest(&self, event: &ReviewCompleted) -> Result<IngestReport, TrackerError> {
        let reference = self.resolve(event).map_err(|e| {
            error!(payload = %event.payload.s3_uri, error = %e, "cannot resolve review-completed event");
            e
        })?;
        info!(job_id = %reference.job_id, artifact = %reference.artifact, "review completed");
        Ok(self.tracker.complete_page(&reference.job_id, &reference.artifact))
    }

    fn read(&self, location: &ObjectLocation) -> Result<Vec<u8>, TrackerError> {
        self.tracker
            .store()
            .get(&location.bucket, &location.key)
            .map_err(|e| TrackerError::Store(format!("{}: {}", location, e)))?
            .ok_or_else(|| malformed(format!("{} does not exist", location)))
    }
}
