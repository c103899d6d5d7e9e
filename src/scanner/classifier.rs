//! Acceptance checks for resolved candidates.

use crate::inspect::{FileInspector, FileMetadata};
use imageforged_common::is_allowed_input_mime;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Decision for one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted(FileMetadata),
    /// The path is already queued.
    Duplicate,
    /// The file is not a supported image, or could not be inspected.
    Unsupported,
}

/// Classifies candidates against the paths already queued.
///
/// Accepted paths are remembered, so a path listed twice in one batch is
/// accepted once and reported as a duplicate the second time.
#[derive(Debug, Default)]
pub struct Classifier {
    queued: HashSet<PathBuf>,
}

impl Classifier {
    pub fn new(queued: HashSet<PathBuf>) -> Self {
        Self { queued }
    }

    pub fn is_queued(&self, path: &Path) -> bool {
        self.queued.contains(path)
    }

    /// Classify `path`, consulting `inspector` only when it is not queued.
    pub async fn classify(&mut self, inspector: &dyn FileInspector, path: &Path) -> Verdict {
        if self.is_queued(path) {
            debug!("Already queued: {:?}", path);
            return Verdict::Duplicate;
        }

        let metadata = match inspector.metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Failed to inspect {:?}: {}", path, e);
                return Verdict::Unsupported;
            }
        };

        if !is_allowed_input_mime(&metadata.mime_type) {
            debug!("Unsupported type {} for {:?}", metadata.mime_type, path);
            return Verdict::Unsupported;
        }

        self.queued.insert(path.to_path_buf());
        Verdict::Accepted(metadata)
    }
}
