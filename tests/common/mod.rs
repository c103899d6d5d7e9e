//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which builds an [`Orchestrator`] over an
//! in-memory file tree ([`MockInspector`]), a scripted engine
//! ([`MockEngine`]) and an in-memory settings store.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{broadcast, Notify};

use imageforged::config::Config;
use imageforged::conversion::{BatchRequest, ConversionEngine, ConvertedFile, EngineEvent};
use imageforged::inspect::{FileInspector, FileMetadata, PathKind};
use imageforged::options::OptionsState;
use imageforged::settings::MemorySettingsStore;
use imageforged::Orchestrator;
use imageforged_common::{Error, Result};

// ---------------------------------------------------------------------------
// Inspector
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Node {
    File { mime_type: String, size: u64 },
    Dir,
}

/// In-memory file tree.
#[derive(Default)]
pub struct MockInspector {
    nodes: Mutex<BTreeMap<PathBuf, Node>>,
    unreadable: Mutex<HashSet<PathBuf>>,
}

impl MockInspector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file (and its parent directories).
    pub fn file(&self, path: &str, mime_type: &str, size: u64) -> PathBuf {
        let path = PathBuf::from(path);
        self.add_parents(&path);
        self.nodes.lock().insert(
            path.clone(),
            Node::File {
                mime_type: mime_type.to_string(),
                size,
            },
        );
        path
    }

    pub fn jpeg(&self, path: &str, size: u64) -> PathBuf {
        self.file(path, "image/jpeg", size)
    }

    pub fn png(&self, path: &str, size: u64) -> PathBuf {
        self.file(path, "image/png", size)
    }

    pub fn dir(&self, path: &str) -> PathBuf {
        let path = PathBuf::from(path);
        self.add_parents(&path);
        self.nodes.lock().insert(path.clone(), Node::Dir);
        path
    }

    /// Make metadata lookups for `path` fail.
    pub fn make_unreadable(&self, path: &Path) {
        self.unreadable.lock().insert(path.to_path_buf());
    }

    fn add_parents(&self, path: &Path) {
        let mut nodes = self.nodes.lock();
        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() || ancestor == Path::new("/") {
                continue;
            }
            nodes.entry(ancestor.to_path_buf()).or_insert(Node::Dir);
        }
    }
}

#[async_trait]
impl FileInspector for MockInspector {
    async fn kind(&self, path: &Path) -> PathKind {
        match self.nodes.lock().get(path) {
            Some(Node::Dir) => PathKind::Directory,
            Some(Node::File { .. }) => PathKind::File,
            None => PathKind::Missing,
        }
    }

    async fn list_children(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let nodes = self.nodes.lock();
        match nodes.get(dir) {
            Some(Node::Dir) => Ok(nodes
                .keys()
                .filter(|path| path.parent() == Some(dir))
                .cloned()
                .collect()),
            _ => Err(Error::not_found(dir.display().to_string())),
        }
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        if self.unreadable.lock().contains(path) {
            return Err(Error::io("permission denied"));
        }
        match self.nodes.lock().get(path) {
            Some(Node::File { mime_type, size }) => Ok(FileMetadata {
                mime_type: mime_type.clone(),
                size_bytes: *size,
            }),
            Some(Node::Dir) => Err(Error::invalid_input("is a directory")),
            None => Err(Error::not_found(path.display().to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// What the next `batch_convert` call does.
#[derive(Debug, Clone)]
pub enum EngineScript {
    /// Convert every item.
    ConvertAll,
    /// Convert only the first `n` items and succeed.
    ConvertFirst(usize),
    /// Convert the first `n` items, then fail with `message`.
    Reject { converted: usize, message: String },
}

/// Scripted engine that "writes" outputs into an in-memory output tree.
///
/// Outputs written by earlier calls stay visible to reconciliation.
pub struct MockEngine {
    tx: broadcast::Sender<EngineEvent>,
    script: Mutex<EngineScript>,
    sizes: Mutex<HashMap<String, u64>>,
    written: Mutex<HashMap<PathBuf, u64>>,
    calls: Mutex<Vec<(BatchRequest, OptionsState)>>,
    gate: Mutex<Option<Arc<Notify>>>,
    reconcile_fails: Mutex<bool>,
}

impl Default for MockEngine {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            tx,
            script: Mutex::new(EngineScript::ConvertAll),
            sizes: Mutex::default(),
            written: Mutex::default(),
            calls: Mutex::default(),
            gate: Mutex::default(),
            reconcile_fails: Mutex::new(false),
        }
    }
}

impl MockEngine {
    pub fn script(&self, script: EngineScript) {
        *self.script.lock() = script;
    }

    pub fn reject(&self, converted: usize, message: &str) {
        self.script(EngineScript::Reject {
            converted,
            message: message.to_string(),
        });
    }

    /// Size reported for the output named `target_name` (default 100).
    pub fn output_size(&self, target_name: &str, size: u64) {
        self.sizes.lock().insert(target_name.to_string(), size);
    }

    /// Pretend `path` already exists in the output tree.
    pub fn existing_output(&self, path: &Path, size: u64) {
        self.written.lock().insert(path.to_path_buf(), size);
    }

    pub fn fail_reconciliation(&self) {
        *self.reconcile_fails.lock() = true;
    }

    /// Block the next call until the returned handle is notified.
    pub fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<(BatchRequest, OptionsState)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ConversionEngine for MockEngine {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    async fn batch_convert(
        &self,
        request: &BatchRequest,
        options: &OptionsState,
    ) -> Result<Vec<ConvertedFile>> {
        self.calls.lock().push((request.clone(), options.clone()));
        let script = self.script.lock().clone();

        let _ = self.tx.send(EngineEvent::TotalKnown(request.len()));

        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let count = match &script {
            EngineScript::ConvertAll => request.len(),
            EngineScript::ConvertFirst(n) => *n,
            EngineScript::Reject { converted, .. } => *converted,
        };

        let mut files = Vec::new();
        for item in request.items.iter().take(count) {
            let output_path = item.target_path(&options.output);
            let output_size = self
                .sizes
                .lock()
                .get(&item.target_name)
                .copied()
                .unwrap_or(100);
            self.written.lock().insert(output_path.clone(), output_size);
            let _ = self.tx.send(EngineEvent::ItemCompleted(item.id));
            tokio::task::yield_now().await;
            files.push(ConvertedFile {
                id: item.id,
                output_path,
                output_size,
            });
        }

        match script {
            EngineScript::Reject { message, .. } => Err(Error::engine(message)),
            _ => Ok(files),
        }
    }

    async fn reconcile_existing(
        &self,
        request: &BatchRequest,
        output_dir: &Path,
    ) -> Result<Vec<ConvertedFile>> {
        if *self.reconcile_fails.lock() {
            return Err(Error::io("output directory unreadable"));
        }
        let written = self.written.lock();
        Ok(request
            .items
            .iter()
            .filter_map(|item| {
                let output_path = item.target_path(output_dir);
                written.get(&output_path).map(|size| ConvertedFile {
                    id: item.id,
                    output_path,
                    output_size: *size,
                })
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// An orchestrator wired to mocks, with the mocks kept at hand.
pub struct TestHarness {
    pub orchestrator: Arc<Orchestrator>,
    pub inspector: Arc<MockInspector>,
    pub engine: Arc<MockEngine>,
    pub settings: Arc<MemorySettingsStore>,
}

impl TestHarness {
    /// Harness with default config, no settle delay and output `/out`.
    pub fn new() -> Self {
        Self::with_settings(MemorySettingsStore::new().with("output", "/out"))
    }

    pub fn with_settings(settings: MemorySettingsStore) -> Self {
        let mut config = Config::default();
        config.conversion.settle_delay_ms = 0;
        Self::with_config(config, settings)
    }

    pub fn with_config(config: Config, settings: MemorySettingsStore) -> Self {
        let inspector = Arc::new(MockInspector::new());
        let engine = Arc::new(MockEngine::default());
        let settings = Arc::new(settings);
        let orchestrator = Arc::new(Orchestrator::new(
            &config,
            inspector.clone(),
            engine.clone(),
            settings.clone(),
        ));

        Self {
            orchestrator,
            inspector,
            engine,
            settings,
        }
    }

    /// Names (`dir/name.ext`) of the standby entries, in order.
    pub fn standby_names(&self) -> Vec<String> {
        self.orchestrator
            .standby()
            .into_iter()
            .map(|e| e.file_name)
            .collect()
    }

    pub fn complete_names(&self) -> Vec<String> {
        self.orchestrator
            .complete()
            .into_iter()
            .map(|e| e.file_name)
            .collect()
    }

    /// Wait until the orchestrator reports a running operation.
    pub async fn wait_until_locked(&self) {
        for _ in 0..1000 {
            if self.orchestrator.is_locked() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("orchestrator never became busy");
    }
}
