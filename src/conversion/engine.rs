//! The [`ConversionEngine`] trait and the batch request/response types it
//! exchanges with the dispatcher.

use crate::options::OptionsState;
use crate::state::ImageEntry;
use async_trait::async_trait;
use imageforged_common::{EntryId, ImageFormat, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;

/// One file the engine is asked to produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub id: EntryId,
    pub source_path: PathBuf,
    /// Output file name, e.g. `photo.webp`.
    pub target_name: String,
    /// Subdirectories of the output directory the file is written under.
    pub dir_segments: Vec<String>,
}

impl BatchItem {
    /// Where this item's output lands under `output_dir`.
    pub fn target_path(&self, output_dir: &Path) -> PathBuf {
        let mut path = output_dir.to_path_buf();
        for segment in &self.dir_segments {
            path.push(segment);
        }
        path.push(&self.target_name);
        path
    }
}

/// Everything submitted to the engine in one call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub items: Vec<BatchItem>,
}

impl BatchRequest {
    /// Build a request converting `entries` to `format`.
    pub fn from_entries(entries: &[ImageEntry], format: ImageFormat) -> Self {
        let items = entries
            .iter()
            .map(|entry| BatchItem {
                id: entry.id,
                source_path: entry.path.clone(),
                target_name: entry.output_name(format),
                dir_segments: entry.dir_segments.clone(),
            })
            .collect();
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A file the engine produced (or found already produced).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertedFile {
    pub id: EntryId,
    pub output_path: PathBuf,
    pub output_size: u64,
}

/// Progress signals emitted while a batch call is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The engine knows how many items it will process.
    TotalKnown(usize),
    /// One item finished.
    ItemCompleted(EntryId),
}

/// An external encoder that converts whole batches.
///
/// Progress is reported through the channel returned by
/// [`subscribe`](ConversionEngine::subscribe); only events sent while a
/// receiver exists are observed.
#[async_trait]
pub trait ConversionEngine: Send + Sync {
    /// A short, human-readable name for this engine.
    fn name(&self) -> &'static str;

    /// Open a receiver for progress events.
    fn subscribe(&self) -> broadcast::Receiver<EngineEvent>;

    /// Convert every item in `request` with the given options.
    ///
    /// May return fewer files than requested when individual items fail.
    /// An `Err` means the batch as a whole failed; some outputs may still
    /// have been written.
    async fn batch_convert(
        &self,
        request: &BatchRequest,
        options: &OptionsState,
    ) -> Result<Vec<ConvertedFile>>;

    /// Look up which requested outputs already exist under `output_dir`.
    async fn reconcile_existing(
        &self,
        request: &BatchRequest,
        output_dir: &Path,
    ) -> Result<Vec<ConvertedFile>>;
}

/// Return every requested target that exists as a regular file.
pub async fn find_existing_outputs(
    request: &BatchRequest,
    output_dir: &Path,
) -> Result<Vec<ConvertedFile>> {
    let mut found = Vec::new();
    for item in &request.items {
        let path = item.target_path(output_dir);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => found.push(ConvertedFile {
                id: item.id,
                output_path: path,
                output_size: meta.len(),
            }),
            _ => {}
        }
    }
    Ok(found)
}
