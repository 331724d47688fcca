//! Routing table and live-reload loop over materialized endpoints
//! (spec §4.6 steps 5–6).

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use sigma_config::ConfigStoreClient;
use sigma_types::{Endpoint, HttpMethod};

use crate::materialize::materialize_endpoints;

/// Immutable routing table for one config generation: `(method, full
/// path)` → endpoint. Built once per reload, never mutated in place.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: HashMap<(HttpMethod, String), Endpoint>,
}

impl RouteTable {
    fn build(api_prefix: &str, endpoints: Vec<Endpoint>) -> Self {
        let mut routes = HashMap::with_capacity(endpoints.len() * 2);
        for endpoint in endpoints {
            let full_path = format!("{api_prefix}{}", endpoint.path);
            for method in endpoint.read_methods.iter().chain(endpoint.write_methods.iter()) {
                // A later endpoint with a colliding (method, path) silently
                // wins the previous entry; duplicate-route detection across
                // a whole reload batch belongs to a stricter validation pass
                // this registry doesn't currently run (spec names rejection
                // of unknown operator tokens, not route collisions).
                routes.insert((*method, full_path.clone()), endpoint.clone());
            }
        }
        Self { routes }
    }

    /// Resolve `(method, path)` to its endpoint, or `None` if no
    /// endpoint owns that path at all, or that method on that path
    /// (spec §4.6 step 5 "routing returns an immutable descriptor or
    /// `NotFound`"; `sigma-gateway` distinguishes 404 from 405 by
    /// also checking [`Self::path_exists`]).
    pub fn resolve(&self, method: HttpMethod, path: &str) -> Option<&Endpoint> {
        self.routes.get(&(method, path.to_string()))
    }

    /// Whether any method routes to `path` at all, for telling a 405
    /// (wrong method) apart from a 404 (unknown path).
    pub fn path_exists(&self, path: &str) -> bool {
        self.routes.keys().any(|(_, p)| p == path)
    }

    /// Number of distinct endpoints backing this table (routes minus
    /// method duplicates), for the `/status` summary.
    pub fn endpoint_count(&self) -> usize {
        self.routes.values().map(|e| &e.name).collect::<std::collections::HashSet<_>>().len()
    }
}

/// Owns the current [`RouteTable`] behind an atomic pointer, rebuilding
/// and republishing it every time the config store signals a change
/// under the endpoints subtree (spec §4.6 step 6, §5 "pointer swap").
pub struct EndpointRegistry {
    table: Arc<ArcSwap<RouteTable>>,
    generation: AtomicU64,
    last_reload_at_millis: AtomicI64,
}

impl EndpointRegistry {
    /// Build the initial table from `store`'s current snapshot.
    pub fn new(store: &dyn ConfigStoreClient, api_prefix: &str, endpoints_root: &str) -> Self {
        let table = Self::materialize(store, api_prefix, endpoints_root);
        Self {
            table: Arc::new(ArcSwap::from_pointee(table)),
            generation: AtomicU64::new(1),
            last_reload_at_millis: AtomicI64::new(Utc::now().timestamp_millis()),
        }
    }

    /// Number of times the table has been (re)built, starting at 1 for
    /// the initial load, for the `/_status` summary.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// When the table was last (re)built.
    pub fn last_reload_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_reload_at_millis.load(Ordering::Acquire)).unwrap_or_else(Utc::now)
    }

    fn materialize(store: &dyn ConfigStoreClient, api_prefix: &str, endpoints_root: &str) -> RouteTable {
        let snapshot = store.snapshot();
        let endpoints = materialize_endpoints(&snapshot, endpoints_root);
        RouteTable::build(api_prefix, endpoints)
    }

    /// Current routing table snapshot. Every request should resolve
    /// through exactly one call to this, never a repeated read, so a
    /// concurrent reload is never observed half-applied.
    pub fn current(&self) -> Arc<RouteTable> {
        self.table.load_full()
    }

    /// Run forever, rebuilding and publishing a fresh table every time
    /// `store` signals a change under `endpoints_root` (spec §5 "Config
    /// watcher. One worker per subtree; re-arms watches after every
    /// fire").
    pub async fn run_reload_loop(
        self: Arc<Self>,
        store: Arc<dyn ConfigStoreClient>,
        api_prefix: String,
        endpoints_root: String,
    ) {
        let mut changes = store.watch(&endpoints_root);
        loop {
            if changes.changed().await.is_err() {
                tracing::warn!("config change channel closed; endpoint reload loop exiting");
                return;
            }
            let rebuilt = Self::materialize(store.as_ref(), &api_prefix, &endpoints_root);
            tracing::info!(endpoints = rebuilt.endpoint_count(), "reloaded endpoint registry");
            self.table.store(Arc::new(rebuilt));
            self.generation.fetch_add(1, Ordering::AcqRel);
            self.last_reload_at_millis.store(Utc::now().timestamp_millis(), Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigma_config::{ConfigError, ConfigNode, ConfigTree};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use tokio::sync::watch;

    struct FixedStore {
        tree: ConfigTree,
        rx: watch::Receiver<()>,
    }

    #[async_trait]
    impl ConfigStoreClient for FixedStore {
        async fn exists(&self, path: &str) -> Result<bool, ConfigError> {
            self.tree.exists(path)
        }
        async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, ConfigError> {
            self.tree.read(path)
        }
        async fn children(&self, path: &str) -> Result<Vec<String>, ConfigError> {
            self.tree.children(path)
        }
        async fn read_subtree(&self, path: &str) -> Result<ConfigNode, ConfigError> {
            self.tree.read_subtree(path)
        }
        fn watch(&self, _path: &str) -> watch::Receiver<()> {
            self.rx.clone()
        }
        fn snapshot(&self) -> Arc<ConfigTree> {
            Arc::new(self.tree.clone())
        }
    }

    fn leaf(value: &str) -> ConfigNode {
        ConfigNode { value: Some(value.as_bytes().to_vec()), children: BTreeMap::new() }
    }

    fn store_with_one_endpoint() -> FixedStore {
        let mut users = BTreeMap::new();
        users.insert("path".to_string(), leaf("/users"));
        users.insert("httpMethod".to_string(), leaf("GET"));
        users.insert("databaseCollection".to_string(), leaf("users"));

        let mut endpoints = BTreeMap::new();
        endpoints.insert("users".to_string(), ConfigNode { value: None, children: users });

        let mut root = ConfigNode::default();
        root.children.insert("endpoints".to_string(), ConfigNode { value: None, children: endpoints });

        let (_tx, rx) = watch::channel(());
        FixedStore { tree: ConfigTree::new(root), rx }
    }

    #[test]
    fn resolves_a_materialized_route() {
        let store = store_with_one_endpoint();
        let registry = EndpointRegistry::new(&store, "/api", "/endpoints");
        let table = registry.current();
        let endpoint = table.resolve(HttpMethod::Get, "/api/users").unwrap();
        assert_eq!(endpoint.name, "users");
    }

    #[test]
    fn distinguishes_unknown_path_from_wrong_method() {
        let store = store_with_one_endpoint();
        let registry = EndpointRegistry::new(&store, "/api", "/endpoints");
        let table = registry.current();
        assert!(table.resolve(HttpMethod::Post, "/api/users").is_none());
        assert!(table.path_exists("/api/users"));
        assert!(!table.path_exists("/api/missing"));
    }
}
