//! Expansion of user-selected paths into candidate files.

use crate::config::IngestConfig;
use crate::inspect::{FileInspector, PathKind};
use imageforged_common::paths;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// How many directory levels below a selected path are expanded.
pub const MAX_DIRECTORY_DEPTH: usize = 1;

/// A candidate file and the directory segments it is grouped under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub path: PathBuf,
    pub dir_segments: Vec<String>,
}

/// Output of [`PathResolver::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub paths: Vec<ResolvedPath>,
    /// A directory deeper than the expansion limit was skipped.
    pub saw_nested_directory: bool,
}

struct Node {
    path: PathBuf,
    kind: PathKind,
    /// 0 for a selected path, 1 for its children, and so on.
    depth: usize,
    dir_segments: Vec<String>,
}

/// Expands selected files and directories, one directory level deep.
#[derive(Debug, Clone)]
pub struct PathResolver {
    max_depth: usize,
    skip_hidden: bool,
    extensions: Vec<String>,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new(&IngestConfig::default())
    }
}

impl PathResolver {
    pub fn new(config: &IngestConfig) -> Self {
        Self {
            max_depth: MAX_DIRECTORY_DEPTH,
            skip_hidden: config.skip_hidden,
            extensions: config.extensions.clone(),
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    fn skipped_as_hidden(&self, path: &Path) -> bool {
        self.skip_hidden && paths::is_hidden(path)
    }

    /// Resolve `inputs` into candidate files, depth first, in input order.
    ///
    /// Selected files are passed through unfiltered; files found inside a
    /// directory must carry an image extension. A selected path that no
    /// longer exists is passed through so it can be reported downstream.
    pub async fn resolve(&self, inspector: &dyn FileInspector, inputs: &[PathBuf]) -> Resolution {
        let mut resolution = Resolution::default();

        for input in inputs {
            let kind = inspector.kind(input).await;
            if kind == PathKind::Directory && self.skipped_as_hidden(input) {
                debug!("Skipping hidden directory {:?}", input);
                continue;
            }

            let mut stack = vec![Node {
                path: input.clone(),
                kind,
                depth: 0,
                dir_segments: Vec::new(),
            }];

            while let Some(node) = stack.pop() {
                match node.kind {
                    PathKind::File | PathKind::Missing => {
                        resolution.paths.push(ResolvedPath {
                            path: node.path,
                            dir_segments: node.dir_segments,
                        });
                    }
                    PathKind::Directory => {
                        if node.depth >= self.max_depth && node.depth > 0 {
                            debug!("Not expanding nested directory {:?}", node.path);
                            resolution.saw_nested_directory = true;
                            continue;
                        }
                        let children = self.expand(inspector, &node).await;
                        // reversed so the first child is popped first
                        stack.extend(children.into_iter().rev());
                    }
                }
            }
        }

        resolution
    }

    async fn expand(&self, inspector: &dyn FileInspector, dir: &Node) -> Vec<Node> {
        let children = match inspector.list_children(&dir.path).await {
            Ok(children) => children,
            Err(e) => {
                warn!("Failed to list directory {:?}: {}", dir.path, e);
                return Vec::new();
            }
        };

        let mut dir_segments = dir.dir_segments.clone();
        dir_segments.push(
            dir.path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );

        let mut nodes = Vec::with_capacity(children.len());
        for child in children {
            if self.skipped_as_hidden(&child) {
                continue;
            }
            let kind = inspector.kind(&child).await;
            match kind {
                PathKind::Directory => {}
                PathKind::File if paths::has_extension(&child, &self.extensions) => {}
                PathKind::File => {
                    debug!("Skipping non-image file {:?}", child);
                    continue;
                }
                PathKind::Missing => continue,
            }
            nodes.push(Node {
                path: child,
                kind,
                depth: dir.depth + 1,
                dir_segments: dir_segments.clone(),
            });
        }
        nodes
    }
}
