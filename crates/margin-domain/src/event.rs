//! Inbound events that start a unit of work
//!
//! Two kinds of message drive the pipeline: the extraction service announcing
//! a finished job, and the review service announcing a finished page. Either
//! may arrive bare or wrapped in a pub/sub delivery envelope
//! (`{"Records": [{"Sns": {"Message": "<json>"}}]}`).

use crate::ObjectLocation;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status value of a successful extraction job
pub const STATUS_SUCCEEDED: &str = "SUCCEEDED";

/// Where the source document of an extraction job lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentLocation {
    /// Bucket of the source document
    #[serde(rename = "S3Bucket")]
    pub bucket: String,

    /// Key of the source document
    #[serde(rename = "S3ObjectName")]
    pub object_name: String,
}

impl DocumentLocation {
    /// Convert to an [`ObjectLocation`]
    pub fn to_location(&self) -> ObjectLocation {
        ObjectLocation::new(self.bucket.clone(), self.object_name.clone())
    }
}

/// Extraction service completion message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionCompleted {
    /// Extraction job id
    #[serde(rename = "JobId")]
    pub job_id: String,

    /// Final job status
    #[serde(rename = "Status")]
    pub status: String,

    /// Source document
    #[serde(rename = "DocumentLocation")]
    pub document_location: DocumentLocation,
}

impl ExtractionCompleted {
    /// Whether the job finished successfully
    pub fn succeeded(&self) -> bool {
        self.status == STATUS_SUCCEEDED
    }
}

/// Payload of a review completion callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewPayload {
    /// URI of the consolidation request
    #[serde(rename = "s3Uri")]
    pub s3_uri: String,
}

/// Review service completion callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewCompleted {
    /// Callback payload
    pub payload: ReviewPayload,
}

impl ReviewCompleted {
    /// Location of the consolidation request
    pub fn request_location(&self) -> Result<ObjectLocation, String> {
        ObjectLocation::parse_uri(&self.payload.s3_uri)
    }
}

/// Any event the pipeline accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InboundEvent {
    /// An extraction job finished
    ExtractionCompleted(ExtractionCompleted),
    /// A review task finished
    ReviewCompleted(ReviewCompleted),
}

impl InboundEvent {
    /// Parse an event, unwrapping a pub/sub delivery envelope if present
    ///
    /// # Examples
    ///
    /// ```
    /// use margin_domain::InboundEvent;
    ///
    /// let raw = br#"{"payload": {"s3Uri": "s3://review/out/request.json"}}"#;
    /// assert!(matches!(
    ///     InboundEvent::parse(raw).unwrap(),
    ///     InboundEvent::ReviewCompleted(_)
    /// ));
    /// ```
    pub fn parse(bytes: &[u8]) -> Result<Self, String> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| format!("Event is not JSON: {}", e))?;
        let value = unwrap_envelope(value)?;
        serde_json::from_value(value).map_err(|_| "Unrecognized event shape".to_string())
    }

    /// Short name of the event kind, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::ExtractionCompleted(_) => "extraction-completed",
            InboundEvent::ReviewCompleted(_) => "review-completed",
        }
    }
}

fn unwrap_envelope(value: Value) -> Result<Value, String> {
    let message = match value.pointer("/Records/0/Sns/Message") {
        Some(message) => message,
        None => return Ok(value),
    };
    match message {
        Value::String(inner) => serde_json::from_str(inner)
            .map_err(|e| format!("Envelope message is not JSON: {}", e)),
        other => Ok(other.clone()),
    }
}
