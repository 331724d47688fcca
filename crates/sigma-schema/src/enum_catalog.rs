//! Enum catalog: `enum_name → [(code, label)]`, refreshed on an
//! interval by a dedicated scheduler task (spec §4.4 "Enum catalog").

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::Deserialize;

use crate::error::SchemaError;

/// One entry in an enum's ordered code/label list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EnumEntry {
    /// Wire code, e.g. `"ACTIVE"`.
    pub code: String,
    /// Human label, e.g. `"Active"`.
    pub value: String,
}

/// `{ name → [ {code, value}, ... ] }`, exactly the enum service's
/// response shape (spec §6 "Enum service contract").
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct EnumCatalog {
    entries: HashMap<String, Vec<EnumEntry>>,
}

impl EnumCatalog {
    /// Ordered codes for `enum_name`, for splicing into a schema's
    /// `enum: [...]` keyword.
    pub fn codes(&self, enum_name: &str) -> Option<Vec<String>> {
        self.entries.get(enum_name).map(|entries| entries.iter().map(|e| e.code.clone()).collect())
    }

    /// Human label for `code` within `enum_name`, for response
    /// enrichment.
    pub fn label(&self, enum_name: &str, code: &str) -> Option<&str> {
        self.entries
            .get(enum_name)?
            .iter()
            .find(|e| e.code == code)
            .map(|e| e.value.as_str())
    }

    /// Whether `enum_name` is known at all.
    pub fn contains(&self, enum_name: &str) -> bool {
        self.entries.contains_key(enum_name)
    }
}

/// Published enum catalog, swapped atomically by the refresh task and
/// read lock-free by every validator/enricher (spec §4.4 "readers
/// observe the latest catalog via an atomic reference").
pub struct EnumCatalogHandle {
    current: Arc<ArcSwap<EnumCatalog>>,
    stale_after_failure: std::sync::atomic::AtomicBool,
    fail_on_load_failure: bool,
    generation: std::sync::atomic::AtomicU64,
}

impl EnumCatalogHandle {
    /// Start empty; the first refresh populates the catalog.
    pub fn new(fail_on_load_failure: bool) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(EnumCatalog::default())),
            stale_after_failure: std::sync::atomic::AtomicBool::new(false),
            fail_on_load_failure,
            generation: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Current catalog snapshot.
    pub fn current(&self) -> Arc<EnumCatalog> {
        self.current.load_full()
    }

    /// Whether writes to enum-referencing endpoints should be refused
    /// right now (spec §4.4 "FailOnEnumLoadFailure").
    pub fn writes_blocked(&self) -> bool {
        self.fail_on_load_failure && self.stale_after_failure.load(std::sync::atomic::Ordering::Acquire)
    }

    /// Number of successful refreshes published so far, for the
    /// `/_status` summary.
    pub fn generation(&self) -> u64 {
        self.generation.load(std::sync::atomic::Ordering::Acquire)
    }

    fn publish(&self, catalog: EnumCatalog) {
        self.current.store(Arc::new(catalog));
        self.stale_after_failure.store(false, std::sync::atomic::Ordering::Release);
        self.generation.fetch_add(1, std::sync::atomic::Ordering::AcqRel);
    }

    fn mark_stale(&self) {
        self.stale_after_failure.store(true, std::sync::atomic::Ordering::Release);
    }

    /// Spawn the dedicated refresh scheduler: one task, fixed interval,
    /// `GET {base_url}/enums`. On failure, logs and retains the
    /// previous catalog (spec §4.4).
    pub fn spawn_refresher(
        self: Arc<Self>,
        client: reqwest::Client,
        base_url: String,
        interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match fetch_catalog(&client, &base_url).await {
                    Ok(catalog) => {
                        tracing::info!(enums = catalog.entries.len(), "refreshed enum catalog");
                        self.publish(catalog);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "enum catalog refresh failed; retaining previous catalog");
                        self.mark_stale();
                    }
                }
            }
        })
    }
}

async fn fetch_catalog(client: &reqwest::Client, base_url: &str) -> Result<EnumCatalog, SchemaError> {
    let url = format!("{base_url}/enums");
    let response = client.get(&url).send().await?;
    let entries: HashMap<String, Vec<EnumEntry>> = response.error_for_status()?.json().await?;
    Ok(EnumCatalog { entries })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog_with(name: &str, entries: &[(&str, &str)]) -> EnumCatalog {
        EnumCatalog {
            entries: HashMap::from([(
                name.to_string(),
                entries
                    .iter()
                    .map(|(code, value)| EnumEntry { code: code.to_string(), value: value.to_string() })
                    .collect(),
            )]),
        }
    }

    #[test]
    fn codes_returns_ordered_wire_values() {
        let catalog = catalog_with("status", &[("ACTIVE", "Active"), ("CLOSED", "Closed")]);
        assert_eq!(catalog.codes("status"), Some(vec!["ACTIVE".to_string(), "CLOSED".to_string()]));
    }

    #[test]
    fn label_looks_up_by_code() {
        let catalog = catalog_with("status", &[("ACTIVE", "Active")]);
        assert_eq!(catalog.label("status", "ACTIVE"), Some("Active"));
        assert_eq!(catalog.label("status", "UNKNOWN"), None);
    }

    #[test]
    fn writes_are_blocked_only_when_stale_and_configured_to_fail() {
        let handle = EnumCatalogHandle::new(true);
        assert!(!handle.writes_blocked());
        handle.mark_stale();
        assert!(handle.writes_blocked());

        let lenient = EnumCatalogHandle::new(false);
        lenient.mark_stale();
        assert!(!lenient.writes_blocked());
    }
}
