//! Image ingestion.
//!
//! This module turns user-selected files and directories into standby
//! entries: [`PathResolver`] expands the selection, [`Classifier`] filters
//! duplicates and unsupported files, and [`IngestionPipeline`] records the
//! accepted ones in the store while reporting progress.

pub mod classifier;
pub mod resolver;

use crate::config::IngestConfig;
use crate::inspect::FileInspector;
use crate::state::{ImageEntry, StateStore, Status};
use imageforged_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use classifier::{Classifier, Verdict};
pub use resolver::{PathResolver, Resolution, ResolvedPath, MAX_DIRECTORY_DEPTH};

/// What happened during one [`IngestionPipeline::ingest`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestFlags {
    pub duplicate_found: bool,
    pub unsupported_found: bool,
    pub saw_nested_directory: bool,
    /// No entry was added.
    pub result_was_empty: bool,
    pub added: usize,
    /// Candidates dropped as duplicate or unsupported.
    pub skipped: usize,
}

/// Adds selected paths to the standby queue.
pub struct IngestionPipeline {
    inspector: Arc<dyn FileInspector>,
    store: Arc<StateStore>,
    resolver: PathResolver,
}

impl IngestionPipeline {
    pub fn new(
        inspector: Arc<dyn FileInspector>,
        store: Arc<StateStore>,
        config: &IngestConfig,
    ) -> Self {
        Self {
            inspector,
            store,
            resolver: PathResolver::new(config),
        }
    }

    pub fn with_resolver(mut self, resolver: PathResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Resolve `paths` and queue every supported image not already queued.
    ///
    /// Relative paths are taken against the current directory, so one file
    /// keeps one id however it was selected. Fails with [`Error::Busy`] while
    /// another operation runs. Individual files never fail the call; they are
    /// reported through the flags.
    pub async fn ingest(&self, paths: &[PathBuf]) -> Result<IngestFlags> {
        if paths.is_empty() {
            if self.store.is_locked() {
                return Err(Error::busy(self.store.progress().status.as_str()));
            }
            return Ok(IngestFlags {
                result_was_empty: true,
                ..IngestFlags::default()
            });
        }

        let _guard = self.store.begin(Status::Loading)?;
        info!("Ingesting {} selected paths", paths.len());

        let selected: Vec<PathBuf> = paths.iter().map(|p| absolute_path(p)).collect();
        let resolution = self
            .resolver
            .resolve(self.inspector.as_ref(), &selected)
            .await;
        let mut flags = IngestFlags {
            saw_nested_directory: resolution.saw_nested_directory,
            ..IngestFlags::default()
        };
        self.store.set_total(resolution.paths.len());

        let mut classifier = Classifier::new(self.store.standby_paths());
        for candidate in resolution.paths {
            match classifier
                .classify(self.inspector.as_ref(), &candidate.path)
                .await
            {
                Verdict::Accepted(metadata) => {
                    let mut entry = ImageEntry::pending(
                        candidate.path,
                        candidate.dir_segments,
                        metadata.mime_type,
                        metadata.size_bytes,
                    );
                    entry.base_name = self.inspector.base_name(&entry.path);
                    debug!("Queued {} as {}", entry.file_name, entry.id);
                    self.store.insert_pending(entry);
                    flags.added += 1;
                }
                Verdict::Duplicate => {
                    flags.duplicate_found = true;
                    flags.skipped += 1;
                }
                Verdict::Unsupported => {
                    flags.unsupported_found = true;
                    flags.skipped += 1;
                }
            }
            self.store.advance(1);
        }

        flags.result_was_empty = flags.added == 0;
        info!(
            "Ingestion finished: {} added, {} skipped",
            flags.added, flags.skipped
        );
        Ok(flags)
    }
}

/// `path` made absolute without touching the filesystem.
fn absolute_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|e| {
        warn!("Cannot make {:?} absolute: {}", path, e);
        path.to_path_buf()
    })
}
