//! Persistence for the user's conversion options.
//!
//! [`TomlSettingsStore`] keeps a flat key/value table in a TOML file and
//! edits it with `toml_edit` so comments and layout survive rewrites.

use imageforged_common::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use toml_edit::{value, DocumentMut, Item};

/// Key/value persistence consulted at startup and written on every change.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Settings stored as top-level keys of a TOML file.
pub struct TomlSettingsStore {
    path: PathBuf,
    doc: Mutex<DocumentMut>,
}

impl TomlSettingsStore {
    /// Open the settings file at `path`.
    ///
    /// A missing file starts an empty document; it is created on the first
    /// write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let doc = match std::fs::read_to_string(&path) {
            Ok(content) => content.parse::<DocumentMut>().map_err(|e| {
                Error::settings(format!("Failed to parse {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => DocumentMut::new(),
            Err(e) => {
                return Err(Error::settings(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        Ok(Self {
            path,
            doc: Mutex::new(doc),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, doc: &DocumentMut) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::settings(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
        }
        std::fs::write(&self.path, doc.to_string()).map_err(|e| {
            Error::settings(format!("Failed to write {}: {}", self.path.display(), e))
        })
    }
}

fn item_to_string(item: &Item) -> Option<String> {
    let value = item.as_value()?;
    value
        .as_str()
        .map(str::to_string)
        .or_else(|| value.as_integer().map(|i| i.to_string()))
        .or_else(|| value.as_bool().map(|b| b.to_string()))
}

impl SettingsStore for TomlSettingsStore {
    fn get(&self, key: &str) -> Option<String> {
        self.doc.lock().get(key).and_then(item_to_string)
    }

    fn set(&self, key: &str, new_value: &str) -> Result<()> {
        let mut doc = self.doc.lock();
        // numbers stay numbers so the file reads naturally
        doc[key] = match new_value.parse::<i64>() {
            Ok(n) => value(n),
            Err(_) => value(new_value),
        };
        self.write(&doc)
    }
}

/// In-memory [`SettingsStore`], optionally refusing writes.
#[derive(Default)]
pub struct MemorySettingsStore {
    values: Mutex<HashMap<String, String>>,
    read_only: bool,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose `set` always fails.
    pub fn read_only() -> Self {
        Self {
            values: Mutex::default(),
            read_only: true,
        }
    }

    pub fn with(self, key: &str, value: &str) -> Self {
        self.values.lock().insert(key.to_string(), value.to_string());
        self
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.read_only {
            return Err(Error::settings("settings store is read-only"));
        }
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_toml_store_round_trips_and_keeps_comments() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "# my options\nformat = \"webp\"\n").unwrap();

        let store = TomlSettingsStore::open(&path).unwrap();
        assert_eq!(store.get("format").as_deref(), Some("webp"));
        assert_eq!(store.get("quality"), None);

        store.set("quality", "65").unwrap();
        store.set("format", "avif").unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("# my options"));
        assert!(written.contains("quality = 65"));
        assert!(written.contains("format = \"avif\""));

        let reopened = TomlSettingsStore::open(&path).unwrap();
        assert_eq!(reopened.get("quality").as_deref(), Some("65"));
        assert_eq!(reopened.get("format").as_deref(), Some("avif"));
    }

    #[test]
    fn test_toml_store_creates_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");

        let store = TomlSettingsStore::open(&path).unwrap();
        assert_eq!(store.get("output"), None);
        store.set("output", "/tmp/out").unwrap();

        assert!(path.exists());
        assert_eq!(store.path(), path.as_path());
    }

    #[test]
    fn test_toml_store_rejects_malformed_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "format = ").unwrap();

        assert!(matches!(
            TomlSettingsStore::open(&path),
            Err(Error::Settings(_))
        ));
    }

    #[test]
    fn test_memory_store() {
        let store = MemorySettingsStore::new().with("format", "avif");
        assert_eq!(store.get("format").as_deref(), Some("avif"));
        store.set("quality", "10").unwrap();
        assert_eq!(store.get("quality").as_deref(), Some("10"));

        let read_only = MemorySettingsStore::read_only();
        assert!(read_only.set("quality", "10").is_err());
    }
}
