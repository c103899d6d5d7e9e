use imageforged_common::{paths, EntryId, ImageFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One queued, converted, or backed-up image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageEntry {
    pub id: EntryId,
    /// Current file location: the source before conversion, the output after.
    pub path: PathBuf,
    /// Directory segments the file was grouped under (empty for loose files).
    pub dir_segments: Vec<String>,
    /// File name without extension.
    pub base_name: String,
    /// Display name including the directory segment, e.g. `holiday/a.jpg`.
    pub file_name: String,
    pub mime_type: String,
    pub size_before: u64,
    pub size_after: u64,
    /// `file://` locator for previewing `path`.
    pub file_url: String,
}

impl ImageEntry {
    /// Build a pending entry for a freshly ingested source file.
    pub fn pending(
        path: PathBuf,
        dir_segments: Vec<String>,
        mime_type: String,
        size_before: u64,
    ) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            id: EntryId::from_path(&path),
            base_name: paths::base_name(&path),
            file_name: join_display_name(&dir_segments, &file_name),
            file_url: paths::file_url(&path),
            path,
            dir_segments,
            mime_type,
            size_before,
            size_after: 0,
        }
    }

    /// Name of the file the engine should write for `format`.
    pub fn output_name(&self, format: ImageFormat) -> String {
        format!("{}.{}", self.base_name, format.extension())
    }

    /// The entry as it looks after a successful conversion to `format`.
    pub fn converted(&self, format: ImageFormat, output_path: &Path, output_size: u64) -> Self {
        let output_name = self.output_name(format);
        Self {
            id: self.id,
            path: output_path.to_path_buf(),
            dir_segments: self.dir_segments.clone(),
            base_name: self.base_name.clone(),
            file_name: join_display_name(&self.dir_segments, &output_name),
            mime_type: format.mime_type().to_string(),
            size_before: self.size_before,
            size_after: output_size,
            file_url: paths::file_url(output_path),
        }
    }
}

fn join_display_name(dir_segments: &[String], file_name: &str) -> String {
    if dir_segments.is_empty() {
        file_name.to_string()
    } else {
        format!("{}/{}", dir_segments.join("/"), file_name)
    }
}

/// Lifecycle stage of a live entry in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Waiting in standby for the next conversion.
    Pending,
    /// Converted; the entry describes the output file.
    Completed,
}

/// What the orchestrator is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Idle,
    Loading,
    Converting,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Idle => "idle",
            Status::Loading => "loading",
            Status::Converting => "converting",
        }
    }
}

/// Progress of the current operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgressState {
    pub status: Status,
    /// Items processed so far.
    pub count: usize,
    /// Expected item count (0 until known).
    pub total: usize,
}

impl ProgressState {
    pub fn percentage(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        (self.count as f32 / self.total as f32 * 100.0).min(100.0)
    }
}

/// Aggregate numbers over the store's views.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub standby: usize,
    pub complete: usize,
    pub backup: usize,
    /// Source bytes of completed entries.
    pub bytes_before: u64,
    /// Output bytes of completed entries.
    pub bytes_after: u64,
}

impl StoreStats {
    /// Bytes saved by the completed conversions (0 if outputs grew).
    pub fn bytes_saved(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_after)
    }
}
