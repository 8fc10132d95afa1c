//! Object locations and the storage key layout
//!
//! Layout under a job prefix (`{output_prefix}/{job_id}`):
//!
//! | Object | Key |
//! |--------|-----|
//! | extraction shard | `{prefix}/{shard}` |
//! | page artifact | `{prefix}/pages/{page}/page/{page}.{ext}` |
//! | per-page extraction result | `{prefix}/pages/{page}/textract-result/{page}.json` |

use serde::{Deserialize, Serialize};
use std::fmt;

const URI_SCHEME: &str = "s3://";

/// A bucket + key pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectLocation {
    /// Bucket name
    pub bucket: String,
    /// Object key
    pub key: String,
}

impl ObjectLocation {
    /// Create a location
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Parse an `s3://bucket/key` URI
    ///
    /// # Examples
    ///
    /// ```
    /// use margin_domain::ObjectLocation;
    ///
    /// let loc = ObjectLocation::parse_uri("s3://docs/in/form.pdf").unwrap();
    /// assert_eq!(loc.bucket, "docs");
    /// assert_eq!(loc.key, "in/form.pdf");
    /// assert_eq!(loc.to_string(), "s3://docs/in/form.pdf");
    /// ```
    pub fn parse_uri(uri: &str) -> Result<Self, String> {
        let rest = uri
            .strip_prefix(URI_SCHEME)
            .ok_or_else(|| format!("Not an s3:// URI: {}", uri))?;
        let (bucket, key) = rest
            .split_once('/')
            .ok_or_else(|| format!("URI has no object key: {}", uri))?;
        if bucket.is_empty() {
            return Err(format!("URI has no bucket: {}", uri));
        }
        let key = key.trim_start_matches('/');
        if key.is_empty() {
            return Err(format!("URI has no object key: {}", uri));
        }
        Ok(Self::new(bucket, key))
    }

    /// Resolve either a full URI or a bare key relative to `default_bucket`
    pub fn resolve(uri_or_key: &str, default_bucket: &str) -> Result<Self, String> {
        if uri_or_key.starts_with(URI_SCHEME) {
            Self::parse_uri(uri_or_key)
        } else {
            let key = uri_or_key.trim_start_matches('/');
            if key.is_empty() {
                return Err("Empty object key".to_string());
            }
            Ok(Self::new(default_bucket, key))
        }
    }

    /// Location of `segment` underneath this one
    pub fn join(&self, segment: &str) -> Self {
        Self::new(
            self.bucket.clone(),
            format!(
                "{}/{}",
                self.key.trim_end_matches('/'),
                segment.trim_start_matches('/')
            ),
        )
    }

    /// Last path component of the key
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", URI_SCHEME, self.bucket, self.key)
    }
}

/// Key prefix for everything belonging to one extraction job
pub fn job_prefix(output_prefix: &str, job_id: &str) -> String {
    let output_prefix = output_prefix.trim_matches('/');
    if output_prefix.is_empty() {
        job_id.to_string()
    } else {
        format!("{}/{}", output_prefix, job_id)
    }
}

/// Key of extraction shard `index` (numbering starts at 1)
pub fn shard_key(prefix: &str, index: u32) -> String {
    format!("{}/{}", prefix, index)
}

/// Key prefix for one page's review objects
pub fn page_prefix(prefix: &str, page: u32) -> String {
    format!("{}/pages/{}", prefix, page)
}

/// Key of the extracted single-page artifact
pub fn page_artifact_key(prefix: &str, page: u32, extension: &str) -> String {
    format!("{}/page/{}.{}", page_prefix(prefix, page), page, extension)
}

/// Key of the per-page re-serialized extraction result
pub fn page_result_key(prefix: &str, page: u32) -> String {
    format!("{}/textract-result/{}.json", page_prefix(prefix, page), page)
}
