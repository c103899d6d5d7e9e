//! Per-file introspection used while ingesting.
//!
//! [`FileInspector`] is the seam between the ingestion pipeline and the
//! filesystem; [`FsInspector`] is the real implementation.

use async_trait::async_trait;
use imageforged_common::{paths, Error, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// What a path points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    File,
    Directory,
    Missing,
}

/// MIME type and size of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub mime_type: String,
    pub size_bytes: u64,
}

/// Source of file information for the ingestion pipeline.
///
/// Implementations must be safe to share across threads (`Send + Sync`).
#[async_trait]
pub trait FileInspector: Send + Sync {
    /// Classify a path as file, directory, or missing.
    async fn kind(&self, path: &Path) -> PathKind;

    /// Direct children of a directory (files and directories), in name order.
    async fn list_children(&self, dir: &Path) -> Result<Vec<PathBuf>>;

    /// Detect the MIME type and size of a file.
    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// File name without its extension.
    fn base_name(&self, path: &Path) -> String {
        paths::base_name(path)
    }
}

/// [`FileInspector`] backed by the local filesystem.
///
/// MIME types are detected from file contents with the `image` crate's format
/// sniffing, so a renamed file is classified by what it really is.
#[derive(Debug, Default, Clone)]
pub struct FsInspector;

impl FsInspector {
    pub fn new() -> Self {
        Self
    }
}

/// Fallback MIME type for content the sniffer does not recognise.
const UNKNOWN_MIME: &str = "application/octet-stream";

fn sniff_mime(path: &Path) -> Result<String> {
    // Not `ImageReader::open`: that seeds the format from the extension.
    let file = BufReader::new(File::open(path)?);
    let reader = image::ImageReader::new(file).with_guessed_format()?;
    Ok(reader
        .format()
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|| UNKNOWN_MIME.to_string()))
}

#[async_trait]
impl FileInspector for FsInspector {
    async fn kind(&self, path: &Path) -> PathKind {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => PathKind::Directory,
            Ok(_) => PathKind::File,
            Err(_) => PathKind::Missing,
        }
    }

    async fn list_children(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let dir = dir.to_path_buf();
        tokio::task::spawn_blocking(move || {
            WalkDir::new(&dir)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name()
                .into_iter()
                .map(|entry| {
                    entry
                        .map(|e| e.into_path())
                        .map_err(|e| Error::io(e.to_string()))
                })
                .collect()
        })
        .await
        .map_err(|e| Error::internal(format!("directory listing task failed: {e}")))?
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        let meta = match tokio::fs::metadata(path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::not_found(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        if !meta.is_file() {
            return Err(Error::invalid_input(format!(
                "not a regular file: {}",
                path.display()
            )));
        }

        let owned = path.to_path_buf();
        let mime_type = tokio::task::spawn_blocking(move || sniff_mime(&owned))
            .await
            .map_err(|e| Error::internal(format!("MIME detection task failed: {e}")))??;

        Ok(FileMetadata {
            mime_type,
            size_bytes: meta.len(),
        })
    }
}
