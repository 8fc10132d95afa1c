//! Services wired to the local collaborators named in the configuration.

use crate::config::MarginConfig;
use crate::error::Result;
use margin_domain::InboundEvent;
use margin_splitter::{SplitOutcome, Splitter};
use margin_store::{FsObjectStore, OutboxNotifier, SqliteTrackingStore};
use margin_tracker::{CompletionTracker, IngestReport, ReviewIngestor};
use serde::Serialize;
use std::fs;

/// Splitter over the filesystem object store, outbox and SQLite tracking.
pub type LocalSplitter = Splitter<FsObjectStore, OutboxNotifier, SqliteTrackingStore>;

/// Ingestor over the filesystem object store, outbox and SQLite tracking.
pub type LocalIngestor = ReviewIngestor<FsObjectStore, OutboxNotifier, SqliteTrackingStore>;

/// Result of handling one inbound event.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventOutcome {
    /// An extraction-completed event was split
    Split(SplitOutcome),
    /// A review-completed event was ingested
    Ingest(IngestReport),
}

/// Both services, sharing one storage layout.
pub struct Pipeline {
    splitter: LocalSplitter,
    ingestor: LocalIngestor,
}

/// Open the tracking database, creating its directory first.
pub fn open_tracking(config: &MarginConfig) -> Result<SqliteTrackingStore> {
    if let Some(parent) = config.storage.tracking_db.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(SqliteTrackingStore::new(&config.storage.tracking_db)?)
}

impl Pipeline {
    /// Build the services described by `config`.
    pub fn open(config: &MarginConfig) -> Result<Self> {
        let store = FsObjectStore::new(&config.storage.object_root);
        let notifier = OutboxNotifier::new(&config.storage.outbox_dir);

        let splitter = Splitter::new(
            store.clone(),
            notifier.clone(),
            open_tracking(config)?,
            config.splitter_config(),
        )?;
        let tracker = CompletionTracker::new(
            store,
            notifier,
            open_tracking(config)?,
            config.tracker_config(),
        )?;

        Ok(Self {
            splitter,
            ingestor: ReviewIngestor::new(tracker),
        })
    }

    /// Splitter service
    pub fn splitter(&self) -> &LocalSplitter {
        &self.splitter
    }

    /// Ingestor service
    pub fn ingestor(&self) -> &LocalIngestor {
        &self.ingestor
    }

    /// Route an event to the service that handles it.
    pub fn handle(&self, event: &InboundEvent) -> Result<EventOutcome> {
        match event {
            InboundEvent::ExtractionCompleted(e) => Ok(EventOutcome::Split(self.splitter.process(e)?)),
            InboundEvent::ReviewCompleted(e) => Ok(EventOutcome::Ingest(self.ingestor.ingest(e)?)),
        }
    }
}
