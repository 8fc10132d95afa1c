//! File outbox notifier
//!
//! Each published message becomes one JSON line in `{dir}/{topic}.jsonl`.
//! A downstream relay (or an operator) drains the files.

use crate::Result;
use margin_domain::traits::{Notification, Notifier};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// One published message as stored in the outbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxRecord {
    /// Topic the message was published to
    pub topic: String,

    /// Subject line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Message body
    pub message: String,

    /// Publish time, seconds since Unix epoch
    pub published_at: u64,
}

/// [`Notifier`] that appends to per-topic JSON-lines files
#[derive(Debug, Clone)]
pub struct OutboxNotifier {
    dir: PathBuf,
}

impl OutboxNotifier {
    /// Create a notifier writing under `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Outbox directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File a topic's messages are appended to
    ///
    /// Topic names such as `arn:aws:sns:eu-west-1:1234:review` are reduced to
    /// filesystem-safe names.
    pub fn topic_file(&self, topic: &str) -> PathBuf {
        let name: String = topic
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.jsonl", name.trim_start_matches('.')))
    }

    /// Read back every message published to `topic`
    pub fn read_topic(&self, topic: &str) -> Result<Vec<OutboxRecord>> {
        let content = match fs::read_to_string(self.topic_file(topic)) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(Into::into))
            .collect()
    }
}

impl Notifier for OutboxNotifier {
    type Error = crate::StoreError;

    fn publish(&self, topic: &str, message: &Notification) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let record = OutboxRecord {
            topic: topic.to_string(),
            subject: message.subject.clone(),
            message: message.body.clone(),
            published_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.topic_file(topic))?;
        file.write_all(&line)?;
        tracing::debug!(topic, "message published to outbox");
        Ok(())
    }
}
