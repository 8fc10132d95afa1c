//! Configuration management for the CLI.
//!
//! ```toml
//! log_level = "info"
//!
//! [pipeline]
//! confidence_threshold = 80.0
//! output_bucket = "textract-output"
//! output_prefix = "results"
//! shard_read_policy = "strict"
//!
//! [topics]
//! review_tasks = "review-tasks"
//! job_complete = "job-complete"
//!
//! [storage]
//! object_root = "/var/lib/margin/objects"
//! tracking_db = "/var/lib/margin/tracking.db"
//! outbox_dir = "/var/lib/margin/outbox"
//!
//! [worker]
//! inbox_dir = "/var/lib/margin/inbox"
//! poll_interval_secs = 5
//! ```

use crate::error::{CliError, Result};
use margin_splitter::{ShardReadPolicy, SplitterConfig};
use margin_tracker::TrackerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarginConfig {
    /// Log filter used when `RUST_LOG` is unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Split and review settings
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Notification topics
    #[serde(default)]
    pub topics: TopicSettings,

    /// Local collaborator locations
    #[serde(default)]
    pub storage: StorageSettings,

    /// Event worker settings
    #[serde(default)]
    pub worker: WorkerSettings,

    /// Output settings
    #[serde(default)]
    pub output: OutputSettings,
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Confidence score below which a page goes to review (0-100)
    pub confidence_threshold: f64,

    /// Bucket holding extraction output and page artifacts
    pub output_bucket: String,

    /// Key prefix of extraction output
    pub output_prefix: String,

    /// Encryption key forwarded with every review task
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,

    /// Shard read failure handling
    pub shard_read_policy: ShardReadPolicy,

    /// Delete page artifacts once reviewed
    pub delete_artifacts: bool,

    /// Scratch directory for page extraction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
}

/// `[topics]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicSettings {
    /// Topic review tasks are published to
    pub review_tasks: String,

    /// Topic the job-complete notification is published to
    pub job_complete: String,
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory backing the object store (`{root}/{bucket}/{key}`)
    pub object_root: PathBuf,

    /// SQLite tracking database
    pub tracking_db: PathBuf,

    /// Directory of per-topic outbox files
    pub outbox_dir: PathBuf,
}

/// `[worker]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Directory polled for event files
    pub inbox_dir: PathBuf,

    /// Seconds between polls
    pub poll_interval_secs: u64,
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,

    /// Default output format
    #[serde(default = "default_format")]
    pub format: OutputFormat,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format
    Table,
    /// JSON format
    Json,
    /// Quiet (minimal) format
    Quiet,
}

/// Base directory for default paths (`~/.margin`).
fn margin_home() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".margin"))
        .unwrap_or_else(|| PathBuf::from(".margin"))
}

fn default_true() -> bool {
    true
}

fn default_format() -> OutputFormat {
    OutputFormat::Table
}

impl Default for PipelineSettings {
    fn default() -> Self {
        let splitter = SplitterConfig::default();
        Self {
            confidence_threshold: splitter.confidence_threshold,
            output_bucket: splitter.output_bucket,
            output_prefix: splitter.output_prefix,
            kms_key_id: None,
            shard_read_policy: splitter.shard_read_policy,
            delete_artifacts: true,
            scratch_dir: None,
        }
    }
}

impl Default for TopicSettings {
    fn default() -> Self {
        Self {
            review_tasks: SplitterConfig::default().review_topic,
            job_complete: TrackerConfig::default().job_complete_topic,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        let home = margin_home();
        Self {
            object_root: home.join("objects"),
            tracking_db: home.join("tracking.db"),
            outbox_dir: home.join("outbox"),
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            inbox_dir: margin_home().join("inbox"),
            poll_interval_secs: 5,
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            color: true,
            format: OutputFormat::Table,
        }
    }
}

impl WorkerSettings {
    /// Poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl MarginConfig {
    /// Default configuration file path (`~/.margin/config.toml`).
    pub fn default_path() -> PathBuf {
        margin_home().join("config.toml")
    }

    /// Load configuration from `path`, or the default path.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(&path)?;
        let config = Self::from_toml(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.splitter_config().validate().map_err(CliError::Config)?;
        self.tracker_config().validate().map_err(CliError::Config)?;
        if self.worker.poll_interval_secs == 0 {
            return Err(CliError::Config(
                "worker.poll_interval_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Splitter configuration derived from this config.
    pub fn splitter_config(&self) -> SplitterConfig {
        SplitterConfig {
            confidence_threshold: self.pipeline.confidence_threshold,
            output_bucket: self.pipeline.output_bucket.clone(),
            output_prefix: self.pipeline.output_prefix.trim_end_matches('/').to_string(),
            kms_key_id: self.pipeline.kms_key_id.clone(),
            shard_read_policy: self.pipeline.shard_read_policy,
            review_topic: self.topics.review_tasks.clone(),
            scratch_dir: self.pipeline.scratch_dir.clone(),
        }
    }

    /// Tracker configuration derived from this config.
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            job_complete_topic: self.topics.job_complete.clone(),
            delete_artifacts: self.pipeline.delete_artifacts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = MarginConfig::default();
        assert_eq!(config.pipeline.confidence_threshold, 80.0);
        assert_eq!(config.worker.poll_interval_secs, 5);
        assert!(config.output.color);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = MarginConfig::from_toml(
            r#"
            log_level = "debug"

            [pipeline]
            confidence_threshold = 65.5
            output_prefix = "results/"
            shard_read_policy = "lenient"

            [topics]
            job_complete = "ops-alerts"
            "#,
        )
        .unwrap();

        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.pipeline.output_bucket, "textract-output");

        let splitter = config.splitter_config();
        assert_eq!(splitter.confidence_threshold, 65.5);
        assert_eq!(splitter.output_prefix, "results");
        assert_eq!(splitter.shard_read_policy, ShardReadPolicy::Lenient);
        assert_eq!(splitter.review_topic, "review-tasks");
        assert_eq!(config.tracker_config().job_complete_topic, "ops-alerts");
    }

    #[test]
    fn test_validation() {
        let mut config = MarginConfig::default();
        config.pipeline.confidence_threshold = 101.0;
        assert!(config.validate().is_err());

        let mut config = MarginConfig::default();
        config.worker.poll_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = MarginConfig::default();
        config.topics.job_complete = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = MarginConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.topics.review_tasks, "review-tasks");
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[worker]\npoll_interval_secs = 0\n").unwrap();
        assert!(matches!(MarginConfig::load(Some(&path)), Err(CliError::Config(_))));
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = MarginConfig::default();
        config.pipeline.kms_key_id = Some("kms-1".to_string());
        let parsed = MarginConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed.pipeline.kms_key_id.as_deref(), Some("kms-1"));
        assert_eq!(parsed.storage.tracking_db, config.storage.tracking_db);
    }
}
