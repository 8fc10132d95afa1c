//! Configuration for the Splitter

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How shard read failures end the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShardReadPolicy {
    /// A missing shard ends the stream; unreadable or malformed shards are errors
    #[default]
    Strict,
    /// Any failure ends the stream
    Lenient,
}

/// Configuration for the Splitter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterConfig {
    /// Pages with any confidence-bearing element below this score go to review
    pub confidence_threshold: f64,

    /// Bucket holding extraction shards and receiving page artifacts
    pub output_bucket: String,

    /// Key prefix under which extraction output is written
    pub output_prefix: String,

    /// Encryption key forwarded to the review service
    pub kms_key_id: Option<String>,

    /// Shard read failure handling
    pub shard_read_policy: ShardReadPolicy,

    /// Topic review tasks are published to
    pub review_topic: String,

    /// Directory for scratch copies (system temp dir if unset)
    pub scratch_dir: Option<PathBuf>,
}

impl SplitterConfig {
    /// Output prefix with surrounding slashes removed
    pub fn normalized_prefix(&self) -> &str {
        self.output_prefix.trim_matches('/')
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.confidence_threshold.is_finite()
            || !(0.0..=100.0).contains(&self.confidence_threshold)
        {
            return Err("confidence_threshold must be between 0 and 100".to_string());
        }
        if self.output_bucket.trim().is_empty() {
            return Err("output_bucket must not be empty".to_string());
        }
        if self.review_topic.trim().is_empty() {
            return Err("review_topic must not be empty".to_string());
        }
        Ok(())
    }
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 80.0,
            output_bucket: "textract-output".to_string(),
            output_prefix: String::new(),
            kms_key_id: None,
            shard_read_policy: ShardReadPolicy::Strict,
            review_topic: "review-tasks".to_string(),
            scratch_dir: None,
        }
    }
}

impl SplitterConfig {
    /// Aggressive preset: high threshold, so more pages go to human review
    pub fn aggressive() -> Self {
        Self {
            confidence_threshold: 95.0,
            ..Self::default()
        }
    }

    /// Lenient preset: low threshold, and shard read failures end the stream quietly
    pub fn lenient() -> Self {
        Self {
            confidence_threshold: 60.0,
            shard_read_policy: ShardReadPolicy::Lenient,
            ..Self::default()
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        assert!(SplitterConfig::default().validate().is_ok());
        assert!(SplitterConfig::aggressive().validate().is_ok());
        assert!(SplitterConfig::lenient().validate().is_ok());
    }

    #[test]
    fn test_invalid_threshold() {
        let mut config = SplitterConfig::default();
        config.confidence_threshold = 120.0;
        assert!(config.validate().is_err());
        config.confidence_threshold = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_bucket_rejected() {
        let config = SplitterConfig {
            output_bucket: " ".to_string(),
            ..SplitterConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_normalized_prefix() {
        let config = SplitterConfig {
            output_prefix: "/textract-output/".to_string(),
            ..SplitterConfig::default()
        };
        assert_eq!(config.normalized_prefix(), "textract-output");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = SplitterConfig::from_toml(
            "confidence_threshold = 55.0\nshard_read_policy = \"lenient\"\n",
        )
        .unwrap();
        assert_eq!(config.confidence_threshold, 55.0);
        assert_eq!(config.shard_read_policy, ShardReadPolicy::Lenient);
        assert_eq!(config.review_topic, "review-tasks");

        let round_trip = SplitterConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(round_trip.shard_read_policy, ShardReadPolicy::Lenient);
    }
}
