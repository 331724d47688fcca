//! [`ConfigStoreClient`] trait and its filesystem-backed implementation.

use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::watch;

use crate::error::ConfigError;
use crate::fs::load_tree;
use crate::tree::ConfigNode;
use crate::tree::ConfigTree;

/// The hierarchical KV tree the gateway reads its configuration from
/// (spec §4.6). `/{ENV}/{SERVICE}/**`, `/{ENV}/dataSource/**`, and
/// `/{ENV}/Globals/**` are the startup paths `sigma-registry` and
/// `sigma-gateway::main` read through this trait.
#[async_trait]
pub trait ConfigStoreClient: Send + Sync {
    /// Whether a node exists at `path`.
    async fn exists(&self, path: &str) -> Result<bool, ConfigError>;

    /// The node's own value at `path`, or `None` if it has none (it may
    /// still have children).
    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, ConfigError>;

    /// Direct child segment names under `path`.
    async fn children(&self, path: &str) -> Result<Vec<String>, ConfigError>;

    /// The full subtree rooted at `path`, as of the current snapshot.
    async fn read_subtree(&self, path: &str) -> Result<ConfigNode, ConfigError>;

    /// A channel that ticks every time the tree has changed anywhere
    /// below `path` (recursive watch). Receivers poll
    /// [`watch::Receiver::changed`] and re-read through [`Self::snapshot`]
    /// when it fires.
    fn watch(&self, path: &str) -> watch::Receiver<()>;

    /// An atomic, point-in-time view of the whole tree. Every read a
    /// caller needs within one logical operation should come from a
    /// single `snapshot()` call, never repeated individual reads, so a
    /// concurrent reload can't be observed half-applied.
    fn snapshot(&self) -> Arc<ConfigTree>;
}

/// Filesystem-backed [`ConfigStoreClient`]. Directories are children,
/// file contents are node values; a `notify` watcher rebuilds the
/// in-memory tree and republishes it through an [`ArcSwap`] whenever
/// anything under `root_dir` changes (spec §4.6 OQ-2: no ZooKeeper
/// client exists in this ecosystem corpus, so the trait's contract is
/// honored with the nearest idiomatic primitive instead).
pub struct FsConfigStore {
    snapshot: Arc<ArcSwap<ConfigTree>>,
    change_tx: watch::Sender<()>,
    change_rx: watch::Receiver<()>,
    // Kept alive for the store's lifetime; dropping it stops delivery.
    _watcher: RecommendedWatcher,
}

impl FsConfigStore {
    /// Load `root_dir` and start watching it. The initial load runs
    /// synchronously so the store is immediately queryable; subsequent
    /// changes arrive asynchronously via `notify`.
    pub fn open(root_dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let root_dir = root_dir.into();
        let initial = ConfigTree::new(load_tree(&root_dir));
        let snapshot = Arc::new(ArcSwap::from_pointee(initial));
        let (change_tx, change_rx) = watch::channel(());

        let watcher_snapshot = Arc::clone(&snapshot);
        let watcher_tx = change_tx.clone();
        let watch_root = root_dir.clone();
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
            if event.is_err() {
                return;
            }
            let rebuilt = ConfigTree::new(load_tree(&watch_root));
            watcher_snapshot.store(Arc::new(rebuilt));
            let _ = watcher_tx.send(());
        })?;
        watcher.watch(&root_dir, RecursiveMode::Recursive)?;

        Ok(Self { snapshot, change_tx, change_rx, _watcher: watcher })
    }
}

#[async_trait]
impl ConfigStoreClient for FsConfigStore {
    async fn exists(&self, path: &str) -> Result<bool, ConfigError> {
        self.snapshot.load().exists(path)
    }

    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, ConfigError> {
        self.snapshot.load().read(path)
    }

    async fn children(&self, path: &str) -> Result<Vec<String>, ConfigError> {
        self.snapshot.load().children(path)
    }

    async fn read_subtree(&self, path: &str) -> Result<ConfigNode, ConfigError> {
        self.snapshot.load().read_subtree(path)
    }

    fn watch(&self, _path: &str) -> watch::Receiver<()> {
        // The change signal is tree-wide rather than path-scoped: every
        // reload touches the whole `ArcSwap`, so callers watching any
        // prefix observe the same tick and re-read their own subtree.
        let _ = &self.change_tx;
        self.change_rx.clone()
    }

    fn snapshot(&self) -> Arc<ConfigTree> {
        self.snapshot.load_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn reads_reflect_the_initial_tree_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("prod/orders")).unwrap();
        std::fs::write(dir.path().join("prod/orders/enabled"), b"true").unwrap();

        let store = FsConfigStore::open(dir.path()).unwrap();
        assert_eq!(store.read("/prod/orders/enabled").await.unwrap(), Some(b"true".to_vec()));
    }

    #[tokio::test]
    async fn a_file_change_eventually_republishes_a_new_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("prod")).unwrap();
        std::fs::write(dir.path().join("prod/flag"), b"off").unwrap();

        let store = FsConfigStore::open(dir.path()).unwrap();
        let mut rx = store.watch("/prod");

        std::fs::write(dir.path().join("prod/flag"), b"on").unwrap();

        let changed = tokio::time::timeout(Duration::from_secs(5), rx.changed()).await;
        assert!(changed.is_ok(), "expected a change notification within 5s");
        assert_eq!(store.read("/prod/flag").await.unwrap(), Some(b"on".to_vec()));
    }
}
