//! Loading a [`ConfigTree`] off disk: directories become children,
//! regular files become leaf values, and a directory's own `.value`
//! file (if present) gives that directory node data in addition to its
//! children.

use std::path::Path;

use crate::error::ConfigError;
use crate::tree::ConfigNode;

const NODE_VALUE_FILE: &str = ".value";

/// Recursively load `dir` into a [`ConfigNode`] tree. A subtree that
/// fails to read (permissions, a symlink loop) is logged and skipped
/// rather than aborting the whole load (spec §4.6 "Bad subtrees are
/// logged and skipped at startup").
pub fn load_tree(dir: &Path) -> ConfigNode {
    match read_dir_node(dir) {
        Ok(node) => node,
        Err(e) => {
            tracing::warn!(path = %dir.display(), error = %e, "failed to load config store root; starting empty");
            ConfigNode::default()
        }
    }
}

fn read_dir_node(dir: &Path) -> Result<ConfigNode, ConfigError> {
    let mut node = ConfigNode::default();

    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();

        if name == NODE_VALUE_FILE {
            match std::fs::read(&path) {
                Ok(bytes) => node.value = Some(bytes),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable node value"),
            }
            continue;
        }

        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping entry with unknown type");
                continue;
            }
        };

        if file_type.is_dir() {
            node.children.insert(name, read_dir_node(&path).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable subtree");
                ConfigNode::default()
            }));
        } else if file_type.is_file() {
            match std::fs::read(&path) {
                Ok(bytes) => {
                    node.children.insert(name, ConfigNode { value: Some(bytes), children: Default::default() });
                }
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable leaf"),
            }
        }
    }

    Ok(node)
}

fn io_err(path: &Path, source: std::io::Error) -> ConfigError {
    ConfigError::Io { path: path.display().to_string(), source }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_nested_directories_and_leaf_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("prod/orders/endpoints")).unwrap();
        std::fs::write(dir.path().join("prod/orders/endpoints/users"), b"path: /users").unwrap();

        let node = load_tree(dir.path());
        let tree = crate::tree::ConfigTree::new(node);
        let value = tree.read("/prod/orders/endpoints/users").unwrap();
        assert_eq!(value, Some(b"path: /users".to_vec()));
    }

    #[test]
    fn a_directory_value_file_gives_the_directory_its_own_data() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("prod/orders")).unwrap();
        std::fs::write(dir.path().join("prod/orders").join(NODE_VALUE_FILE), b"enabled").unwrap();

        let node = load_tree(dir.path());
        let tree = crate::tree::ConfigTree::new(node);
        assert_eq!(tree.read("/prod/orders").unwrap(), Some(b"enabled".to_vec()));
    }
}
