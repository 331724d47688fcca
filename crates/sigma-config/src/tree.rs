//! In-memory config tree, read-only view mirrored from disk.

use std::collections::BTreeMap;

use crate::error::ConfigError;

/// One node of the configuration tree: optional byte value plus named
/// children, mirroring a ZooKeeper znode's dual data/children shape
/// (spec §4.6 "hierarchical byte-array KV").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigNode {
    /// This node's own data, if any was written directly to it.
    pub value: Option<Vec<u8>>,
    /// Named child nodes, keyed by their path segment.
    pub children: BTreeMap<String, ConfigNode>,
}

/// The full tree as of one `snapshot()` call. Readers hold this value
/// for the lifetime of a request so a concurrent write can never be
/// observed mid-tree (spec §4.6 "atomic snapshot").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigTree {
    root: ConfigNode,
}

/// Split `/a/b/c` into `["a", "b", "c"]`, rejecting anything that isn't
/// an absolute path with no empty segments.
pub fn split_path(path: &str) -> Result<Vec<&str>, ConfigError> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = path.strip_prefix('/') else {
        return Err(ConfigError::MalformedPath(path.to_string()));
    };
    if rest.is_empty() {
        return Ok(Vec::new());
    }
    let segments: Vec<&str> = rest.split('/').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(ConfigError::MalformedPath(path.to_string()));
    }
    Ok(segments)
}

impl ConfigTree {
    /// Build a tree with `root` as its top node.
    pub fn new(root: ConfigNode) -> Self {
        Self { root }
    }

    fn navigate(&self, segments: &[&str]) -> Option<&ConfigNode> {
        let mut node = &self.root;
        for segment in segments {
            node = node.children.get(*segment)?;
        }
        Some(node)
    }

    /// Whether a node exists at `path` (with a value, children, or both).
    pub fn exists(&self, path: &str) -> Result<bool, ConfigError> {
        let segments = split_path(path)?;
        Ok(self.navigate(&segments).is_some())
    }

    /// This node's own value, if any.
    pub fn read(&self, path: &str) -> Result<Option<Vec<u8>>, ConfigError> {
        let segments = split_path(path)?;
        Ok(self.navigate(&segments).and_then(|n| n.value.clone()))
    }

    /// Direct child segment names, in sorted order.
    pub fn children(&self, path: &str) -> Result<Vec<String>, ConfigError> {
        let segments = split_path(path)?;
        Ok(self
            .navigate(&segments)
            .map(|n| n.children.keys().cloned().collect())
            .unwrap_or_default())
    }

    /// The entire subtree rooted at `path`.
    pub fn read_subtree(&self, path: &str) -> Result<ConfigNode, ConfigError> {
        let segments = split_path(path)?;
        Ok(self.navigate(&segments).cloned().unwrap_or_default())
    }
}
