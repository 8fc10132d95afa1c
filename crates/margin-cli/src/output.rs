//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use crate::worker::WorkerMetrics;
use colored::*;
use margin_domain::JobTrackingRecord;
use margin_splitter::{SplitOutcome, SplitReport, TrackingOutcome};
use margin_tracker::{CounterState, IngestReport};
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Output format in use.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Format the outcome of a split run.
    pub fn format_split(&self, outcome: &SplitOutcome) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(outcome)?),
            OutputFormat::Quiet => Ok(match outcome {
                SplitOutcome::Skipped { .. } | SplitOutcome::AlreadyTracked { .. } => {
                    String::new()
                }
                SplitOutcome::Processed(report) => report
                    .dispatch
                    .dispatched
                    .iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join("\n"),
            }),
            OutputFormat::Table => Ok(match outcome {
                SplitOutcome::Skipped { job_id, status } => self.warning(&format!(
                    "Job {} finished with status {}; nothing to split",
                    job_id, status
                )),
                SplitOutcome::AlreadyTracked {
                    job_id,
                    pages_outstanding,
                } => self.warning(&format!(
                    "Job {} already dispatched; {} pages outstanding",
                    job_id, pages_outstanding
                )),
                SplitOutcome::Processed(report) => self.split_table(report),
            }),
        }
    }

    fn split_table(&self, report: &SplitReport) -> String {
        let flagged = if report.pages_flagged.is_empty() {
            "-".to_string()
        } else {
            report
                .pages_flagged
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        let tracking = match &report.dispatch.tracking {
            TrackingOutcome::Recorded { pages_sent } => format!("{} outstanding", pages_sent),
            TrackingOutcome::Skipped => "not tracked".to_string(),
            TrackingOutcome::AlreadyTracked { pages_outstanding } => {
                format!("already tracked ({} outstanding)", pages_outstanding)
            }
            TrackingOutcome::Failed { reason } => format!("failed: {}", reason),
        };

        let mut builder = Builder::default();
        builder.push_record(["Job", "Pages", "Flagged", "Dispatched", "Failed", "Tracking"]);
        builder.push_record([
            report.job_id.clone(),
            report.pages_seen.to_string(),
            flagged,
            report.dispatch.dispatched.len().to_string(),
            report.dispatch.failed.len().to_string(),
            tracking,
        ]);
        let mut lines = vec![self.table(builder)];

        for failure in &report.failures {
            lines.push(self.error(&format!(
                "Page {} ({:?}): {}",
                failure.page, failure.stage, failure.reason
            )));
        }
        if let Some(reason) = &report.stream_error {
            lines.push(self.error(&format!("Shard stream stopped early: {}", reason)));
        }
        if report.is_clean() {
            lines.push(self.success("Split complete"));
        }
        lines.join("\n")
    }

    /// Format the result of one review ingestion.
    pub fn format_ingest(&self, report: &IngestReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
            OutputFormat::Quiet => Ok(report
                .remaining()
                .map(|n| n.to_string())
                .unwrap_or_default()),
            OutputFormat::Table => {
                let remaining = match &report.counter {
                    CounterState::Remaining { count } => count.to_string(),
                    CounterState::AlreadyComplete => "0 (already complete)".to_string(),
                    CounterState::AlreadyCounted => "unchanged (page already counted)".to_string(),
                    CounterState::NotTracked => "not tracked".to_string(),
                    CounterState::Unknown { reason } => format!("unknown: {}", reason),
                };
                let mut builder = Builder::default();
                builder.push_record(["Job", "Remaining", "Artifact", "Deleted"]);
                builder.push_record([
                    report.job_id.clone(),
                    remaining,
                    report.artifact.to_string(),
                    yes_no(report.artifact_deleted).to_string(),
                ]);
                let mut lines = vec![self.table(builder)];
                if report.completion_published {
                    lines.push(self.success(&format!("Job {} review complete", report.job_id)));
                }
                if let Some(reason) = &report.notify_error {
                    lines.push(self.error(&format!("Completion notification failed: {}", reason)));
                }
                Ok(lines.join("\n"))
            }
        }
    }

    /// Format a job's tracking record.
    pub fn format_status(&self, record: &JobTrackingRecord) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(record)?),
            OutputFormat::Quiet => Ok(record.pages_sent.to_string()),
            OutputFormat::Table => {
                let mut builder = Builder::default();
                builder.push_record(["Job", "Outstanding", "Sent At", "State"]);
                let state = if record.is_complete() {
                    self.colorize("complete", "green")
                } else {
                    self.colorize("in review", "yellow")
                };
                builder.push_record([
                    record.job_id.clone(),
                    record.pages_sent.to_string(),
                    record.date_sent.to_string(),
                    state,
                ]);
                Ok(self.table(builder))
            }
        }
    }

    /// Format the totals of a worker run.
    pub fn format_worker(&self, metrics: &WorkerMetrics) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let value = serde_json::json!({
                    "cycles": metrics.cycles,
                    "events_processed": metrics.events_processed,
                    "events_failed": metrics.events_failed,
                    "jobs_split": metrics.jobs_split,
                    "tasks_dispatched": metrics.tasks_dispatched,
                    "pages_ingested": metrics.review.pages_ingested,
                    "jobs_completed": metrics.review.completed_jobs.iter().collect::<Vec<_>>(),
                });
                Ok(serde_json::to_string_pretty(&value)?)
            }
            OutputFormat::Quiet => Ok(metrics.events_processed.to_string()),
            OutputFormat::Table => {
                let mut builder = Builder::default();
                builder.push_record(["Cycles", "Processed", "Failed", "Jobs Split", "Tasks", "Reviews"]);
                builder.push_record([
                    metrics.cycles.to_string(),
                    metrics.events_processed.to_string(),
                    metrics.events_failed.to_string(),
                    metrics.jobs_split.to_string(),
                    metrics.tasks_dispatched.to_string(),
                    metrics.review.pages_ingested.to_string(),
                ]);
                Ok(self.table(builder))
            }
        }
    }

    fn table(&self, builder: Builder) -> String {
        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));
        table.to_string()
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            _ => text.to_string(),
        }
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
