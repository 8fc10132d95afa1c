//! Background worker that processes event files dropped into an inbox.
//!
//! Each poll reads every `*.json` file in the inbox in name order, handles
//! it, and moves it to `processed/` or `failed/` so it is never handled
//! twice.

use crate::error::{CliError, Result};
use crate::pipeline::{EventOutcome, Pipeline};
use margin_domain::InboundEvent;
use margin_splitter::SplitOutcome;
use margin_tracker::TrackerMetrics;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::time::{interval, Duration};

/// Subdirectory for handled event files
pub const PROCESSED_DIR: &str = "processed";

/// Subdirectory for event files that could not be handled
pub const FAILED_DIR: &str = "failed";

/// Totals over a worker run
#[derive(Debug, Clone, Default)]
pub struct WorkerMetrics {
    /// Polls completed
    pub cycles: usize,

    /// Event files handled
    pub events_processed: usize,

    /// Event files moved to `failed/`
    pub events_failed: usize,

    /// Event files that could not be moved out of the inbox
    pub moves_failed: usize,

    /// Extraction jobs split
    pub jobs_split: usize,

    /// Review tasks published
    pub tasks_dispatched: usize,

    /// Review ingestion totals
    pub review: TrackerMetrics,
}

impl WorkerMetrics {
    fn record(&mut self, outcome: &EventOutcome) {
        self.events_processed += 1;
        match outcome {
            EventOutcome::Split(SplitOutcome::Processed(report)) => {
                self.jobs_split += 1;
                self.tasks_dispatched += report.dispatch.dispatched.len();
            }
            EventOutcome::Split(
                SplitOutcome::Skipped { .. } | SplitOutcome::AlreadyTracked { .. },
            ) => {}
            EventOutcome::Ingest(report) => self.review.record(report),
        }
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        format!(
            "cycles={} processed={} failed={} unmoved={} jobs_split={} tasks={}\n{}",
            self.cycles,
            self.events_processed,
            self.events_failed,
            self.moves_failed,
            self.jobs_split,
            self.tasks_dispatched,
            self.review.summary()
        )
    }
}

/// Polls an inbox directory on a fixed interval
pub struct EventWorker {
    pipeline: Pipeline,
    inbox: PathBuf,
    interval: Duration,
    metrics: WorkerMetrics,
}

impl EventWorker {
    /// Create a worker over `inbox`
    pub fn new(pipeline: Pipeline, inbox: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            pipeline,
            inbox: inbox.into(),
            interval,
            metrics: WorkerMetrics::default(),
        }
    }

    /// Totals so far
    pub fn metrics(&self) -> &WorkerMetrics {
        &self.metrics
    }

    /// Run until a shutdown signal (Ctrl+C) is received
    pub async fn run(&mut self) -> Result<()> {
        let mut ticker = interval(self.interval);

        tracing::info!(inbox = %self.inbox.display(), "event worker started (interval: {:?})", self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.poll() {
                        tracing::error!("Poll failed: {}", e);
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutdown signal received, stopping worker");
                    break;
                }
            }
        }

        tracing::info!("Worker stopped. Final metrics:\n{}", self.metrics.summary());
        Ok(())
    }

    /// Run for a fixed number of polls
    pub async fn run_cycles(&mut self, cycles: usize) -> Result<()> {
        let mut ticker = interval(self.interval);

        tracing::info!(inbox = %self.inbox.display(), "event worker started for {} cycles", cycles);

        for cycle in 0..cycles {
            ticker.tick().await;
            tracing::debug!("Starting poll {}/{}", cycle + 1, cycles);
            self.poll()?;
        }

        tracing::info!("Worker finished {} cycles. Final metrics:\n{}", cycles, self.metrics.summary());
        Ok(())
    }

    /// Handle every event file currently in the inbox
    ///
    /// Returns how many files were picked up.
    pub fn poll(&mut self) -> Result<usize> {
        fs::create_dir_all(&self.inbox)?;
        let files = pending_files(&self.inbox)?;

        for path in &files {
            let dest = match self.handle_file(path) {
                Ok(outcome) => {
                    self.metrics.record(&outcome);
                    PROCESSED_DIR
                }
                Err(e) => {
                    tracing::error!(file = %path.display(), error = %e, "event file failed");
                    if matches!(e, CliError::Tracker(_)) {
                        self.metrics.review.record_rejected();
                    }
                    self.metrics.events_failed += 1;
                    FAILED_DIR
                }
            };
            // Left in the inbox, the file is handled again next poll
            if let Err(e) = move_into(path, &self.inbox.join(dest)) {
                tracing::error!(file = %path.display(), dest, error = %e, "could not move event file");
                self.metrics.moves_failed += 1;
            }
        }

        self.metrics.cycles += 1;
        Ok(files.len())
    }

    fn handle_file(&self, path: &Path) -> Result<EventOutcome> {
        let bytes = fs::read(path)?;
        let event = InboundEvent::parse(&bytes).map_err(CliError::InvalidInput)?;
        tracing::info!(file = %path.display(), kind = event.kind(), "handling event");
        self.pipeline.handle(&event)
    }
}

/// `*.json` files directly in `dir`, sorted by name
fn pending_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn move_into(path: &Path, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    if let Some(name) = path.file_name() {
        fs::rename(path, dir.join(name))?;
    }
    Ok(())
}
