//! The [`Orchestrator`] facade wiring ingestion, conversion, undo and
//! options around one shared [`StateStore`].

use crate::config::Config;
use crate::conversion::{ConversionDispatcher, ConversionEngine, ConversionOutcome};
use crate::inspect::FileInspector;
use crate::options::{OptionsController, OptionsState};
use crate::scanner::{IngestFlags, IngestionPipeline};
use crate::settings::SettingsStore;
use crate::state::{Event, ImageEntry, ProgressState, StateStore, StoreStats};
use imageforged_common::{EntryId, Error, ImageFormat, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;

/// Entry point for every user-facing operation.
pub struct Orchestrator {
    store: Arc<StateStore>,
    ingestion: IngestionPipeline,
    dispatcher: ConversionDispatcher,
    options: OptionsController,
}

impl Orchestrator {
    pub fn new(
        config: &Config,
        inspector: Arc<dyn FileInspector>,
        engine: Arc<dyn ConversionEngine>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        let store = StateStore::new();
        let ingestion = IngestionPipeline::new(inspector, store.clone(), &config.ingest);
        let dispatcher = ConversionDispatcher::new(engine, store.clone())
            .with_settle_delay(Duration::from_millis(config.conversion.settle_delay_ms));
        let options = OptionsController::load(
            settings,
            store.clone(),
            OptionsState::from_config(&config.conversion),
        );

        Self {
            store,
            ingestion,
            dispatcher,
            options,
        }
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Queue the images found at `paths`.
    pub async fn ingest(&self, paths: &[PathBuf]) -> Result<IngestFlags> {
        self.ingestion.ingest(paths).await
    }

    /// Convert everything in standby with the current options.
    pub async fn convert(&self) -> Result<ConversionOutcome> {
        let snapshot = self.store.standby();
        let options = self.options.snapshot();
        self.dispatcher.convert(snapshot, &options).await
    }

    /// Undo the most recent conversion.
    ///
    /// Returns `false` when there is nothing to undo.
    pub fn restore(&self) -> Result<bool> {
        if self.store.is_locked() {
            return Err(Error::busy(self.store.progress().status.as_str()));
        }
        let restored = self.store.restore();
        if !restored.is_empty() {
            info!("Restored {} entries to standby", restored.len());
        }
        Ok(!restored.is_empty())
    }

    pub fn remove_item(&self, id: EntryId) -> bool {
        self.store.remove_item(id)
    }

    pub fn remove_all(&self) {
        self.store.remove_all();
    }

    pub fn set_format(&self, format: ImageFormat) {
        self.options.set_format(format);
    }

    pub fn set_quality(&self, quality: u8) -> Result<()> {
        self.options.set_quality(quality)
    }

    /// Returns `true` if the directory changed (completed entries dropped).
    pub fn set_output(&self, output: impl Into<PathBuf>) -> bool {
        self.options.set_output(output)
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    pub fn options(&self) -> OptionsState {
        self.options.snapshot()
    }

    pub fn standby(&self) -> Vec<ImageEntry> {
        self.store.standby()
    }

    pub fn complete(&self) -> Vec<ImageEntry> {
        self.store.complete()
    }

    pub fn backup(&self) -> Vec<ImageEntry> {
        self.store.backup()
    }

    pub fn get(&self, id: EntryId) -> Option<ImageEntry> {
        self.store.get(id)
    }

    pub fn progress(&self) -> ProgressState {
        self.store.progress()
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    pub fn is_locked(&self) -> bool {
        self.store.is_locked()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.store.subscribe()
    }

    /// The `n` most recent store events, oldest first.
    pub fn recent_events(&self, n: usize) -> Vec<Event> {
        let mut events = self.store.recent_events(n);
        events.reverse();
        events
    }
}
