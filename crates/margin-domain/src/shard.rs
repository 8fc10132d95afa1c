//! Extraction-result shards
//!
//! A paginated extraction result is written as numbered shards (`1`, `2`, ...).
//! Each shard repeats the envelope fields and carries a slice of the block list.

use crate::{ExtractionElement, PageGroup};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Document-level metadata carried by each shard
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Total page count of the source document
    #[serde(rename = "Pages", default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,
}

/// One numbered fragment of an extraction result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionShard {
    /// Model version tag of the extraction service
    #[serde(
        rename = "AnalyzeDocumentModelVersion",
        alias = "DetectDocumentTextModelVersion"
    )]
    pub model_version: String,

    /// Elements in document order
    #[serde(rename = "Blocks")]
    pub blocks: Vec<ExtractionElement>,

    /// Document metadata
    #[serde(rename = "DocumentMetadata", default)]
    pub document_metadata: DocumentMetadata,

    /// Job status reported by the extraction service
    #[serde(rename = "JobStatus")]
    pub job_status: String,

    /// Continuation token
    #[serde(rename = "NextToken", default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,

    /// Status detail
    #[serde(rename = "StatusMessage", default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,

    /// Warnings raised during extraction
    #[serde(rename = "Warnings", default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Value>,
}

impl ExtractionShard {
    /// Parse a shard and normalize absent/null optional fields
    pub fn parse(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let mut shard: ExtractionShard = serde_json::from_slice(bytes)?;
        for block in &mut shard.blocks {
            block.strip_nulls();
        }
        if let Some(warnings) = shard.warnings.as_mut() {
            crate::element::strip_nulls(warnings);
        }
        Ok(shard)
    }

    /// Total page count declared in the document metadata
    pub fn total_pages(&self) -> Option<u32> {
        self.document_metadata.pages
    }

    /// Build a single-page result: this envelope with only `page`'s blocks
    ///
    /// Continuation fields are dropped since the result is self-contained.
    pub fn for_page(&self, page: &PageGroup) -> ExtractionShard {
        ExtractionShard {
            model_version: self.model_version.clone(),
            blocks: page.blocks().cloned().collect(),
            document_metadata: self.document_metadata.clone(),
            job_status: self.job_status.clone(),
            next_token: None,
            status_message: None,
            warnings: None,
        }
    }
}
