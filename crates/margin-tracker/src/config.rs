//! Configuration for the CompletionTracker

use serde::{Deserialize, Serialize};

/// Subject line of the job-complete notification
pub const COMPLETION_SUBJECT: &str = "Job Complete";

/// Configuration for the CompletionTracker
///
/// # Examples
///
/// ```
/// use margin_tracker::TrackerConfig;
///
/// let config = TrackerConfig::from_toml("job_complete_topic = \"done\"").unwrap();
/// assert_eq!(config.job_complete_topic, "done");
/// assert!(config.delete_artifacts);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Topic the job-complete notification is published to
    pub job_complete_topic: String,

    /// Delete each page artifact once its review is ingested
    ///
    /// Turning this off keeps artifacts around for inspection.
    pub delete_artifacts: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            job_complete_topic: "job-complete".to_string(),
            delete_artifacts: true,
        }
    }
}

impl TrackerConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.job_complete_topic.trim().is_empty() {
            return Err("job_complete_topic must not be empty".to_string());
        }
        Ok(())
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
