//! Review tasks - one flagged page submitted for human review

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a review task based on UUIDv7
///
/// UUIDv7 keeps task ids chronologically sortable, which makes dispatch
/// reports read in publish order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TaskId(u128);

impl TaskId {
    /// Generate a new UUIDv7-based TaskId
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().as_u128())
    }

    /// Parse a TaskId from its UUID string form
    ///
    /// # Examples
    ///
    /// ```
    /// use margin_domain::TaskId;
    ///
    /// let id = TaskId::new();
    /// let parsed = TaskId::from_string(&id.to_string()).unwrap();
    /// assert_eq!(id, parsed);
    /// ```
    pub fn from_string(s: &str) -> Result<Self, String> {
        uuid::Uuid::parse_str(s)
            .map(|u| Self(u.as_u128()))
            .map_err(|e| format!("Invalid task id: {}", e))
    }

    /// Get the raw u128 value
    pub fn value(&self) -> u128 {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from_u128(self.0))
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for TaskId {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        TaskId::from_string(&s)
    }
}

/// Descriptor of an extracted single-page artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageArtifact {
    /// Human-readable description of where the page came from
    pub source: String,

    /// Extension of the artifact, with leading dot (e.g. `.pdf`)
    pub file_extension: String,

    /// Prefix the review service reads the page from
    #[serde(rename = "inputS3Prefix")]
    pub input_prefix: String,

    /// Prefix the review service writes its answers to
    #[serde(rename = "outputS3Prefix")]
    pub output_prefix: String,

    /// Full URI of the artifact itself
    #[serde(rename = "artifactS3Uri")]
    pub artifact_uri: String,

    /// Page number in the source document
    #[serde(rename = "currPageNumber")]
    pub page_number: u32,

    /// Pages in the artifact (always 1)
    #[serde(rename = "numberOfPages")]
    pub page_count: u32,
}

/// Review settings carried with every task
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewConfiguration {
    /// Threshold the page was gated with
    pub default_confidence_threshold: f64,
}

/// One flagged page awaiting human review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewTask {
    /// Task identifier, reported back on publish failure
    pub task_id: TaskId,

    /// Extraction job the page belongs to
    #[serde(rename = "textractJobId")]
    pub job_id: String,

    /// URI of the original multi-page document
    pub source_document: String,

    /// The single-page artifact
    #[serde(flatten)]
    pub artifact: PageArtifact,

    /// Encryption key for review output, if any
    #[serde(rename = "outputKmsKeyId", default, skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,

    /// Review settings
    pub configuration: ReviewConfiguration,
}

impl ReviewTask {
    /// Create a task for an extracted page
    pub fn new(
        job_id: impl Into<String>,
        source_document: impl Into<String>,
        artifact: PageArtifact,
        threshold: f64,
    ) -> Self {
        Self {
            task_id: TaskId::new(),
            job_id: job_id.into(),
            source_document: source_document.into(),
            artifact,
            kms_key_id: None,
            configuration: ReviewConfiguration {
                default_confidence_threshold: threshold,
            },
        }
    }

    /// Attach the output encryption key
    pub fn with_kms_key(mut self, kms_key_id: Option<String>) -> Self {
        self.kms_key_id = kms_key_id;
        self
    }

    /// Page number under review
    pub fn page_number(&self) -> u32 {
        self.artifact.page_number
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact() -> PageArtifact {
        PageArtifact {
            source: "review document form.pdf page number 2".to_string(),
            file_extension: ".pdf".to_string(),
            input_prefix: "s3://out/job/pages/2".to_string(),
            output_prefix: "s3://out/job/pages/2".to_string(),
            artifact_uri: "s3://out/job/pages/2/page/2.pdf".to_string(),
            page_number: 2,
            page_count: 1,
        }
    }

    #[test]
    fn test_task_ids_are_unique() {
        assert_ne!(TaskId::new(), TaskId::new());
        assert!(TaskId::from_string("not-a-uuid").is_err());
    }

    #[test]
    fn test_task_wire_shape() {
        let task = ReviewTask::new("job-1", "s3://in/form.pdf", artifact(), 80.0)
            .with_kms_key(Some("key-1".to_string()));
        let json = serde_json::to_value(&task).unwrap();

        assert_eq!(json["textractJobId"], "job-1");
        assert_eq!(json["fileExtension"], ".pdf");
        assert_eq!(json["inputS3Prefix"], "s3://out/job/pages/2");
        assert_eq!(json["currPageNumber"], 2);
        assert_eq!(json["numberOfPages"], 1);
        assert_eq!(json["outputKmsKeyId"], "key-1");
        assert_eq!(json["configuration"]["defaultConfidenceThreshold"], 80.0);
        assert_eq!(json["taskId"], task.task_id.to_string());
    }

    #[test]
    fn test_task_without_kms_key_omits_field() {
        let task = ReviewTask::new("job-1", "s3://in/form.pdf", artifact(), 80.0);
        let json = serde_json::to_value(&task).unwrap();
        assert!(json.get("outputKmsKeyId").is_none());

        let parsed: ReviewTask = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, task);
    }
}
