//! Shared, read-mostly application state (spec §5 "Shared state and its
//! owners").

use std::sync::Arc;

use sigma_filter::OperatorRegistry;
use sigma_registry::EndpointRegistry;
use sigma_repository::RepositoryError;
use sigma_schema::{EnumCatalogHandle, SchemaRegistry};

/// Everything a request handler needs, held behind `Arc`s so cloning
/// `AppState` per request is cheap and every clone observes the same
/// atomically-swapped snapshots (spec §5 "each held behind an atomic
/// pointer to an immutable value").
#[derive(Clone)]
pub struct AppState {
    /// Connection-pool-backed document repository for the active
    /// dialect.
    pub repository: Arc<dyn sigma_repository::DocumentRepository>,
    /// Shared operator-token → strategy map (stateless, built once).
    pub operators: Arc<OperatorRegistry>,
    /// Live-reloading endpoint descriptor table.
    pub endpoints: Arc<EndpointRegistry>,
    /// Registered JSON Schema documents.
    pub schemas: Arc<SchemaRegistry>,
    /// Continuously refreshed enum catalog.
    pub enum_catalog: Arc<EnumCatalogHandle>,
    /// Configured `current_auditor()` capability (spec §6 "Auditor
    /// identity").
    pub current_auditor: Arc<dyn Fn() -> String + Send + Sync>,
    /// API path prefix every endpoint route is mounted under.
    pub api_prefix: String,
}

impl AppState {
    /// Build an [`sigma_types::AuditContext`] for one request: a fresh
    /// or caller-supplied `X-Request-ID` plus the configured auditor
    /// identity (spec §6 "Auditor identity ... deterministic per
    /// request").
    pub fn audit_context(&self, request_id: Option<String>) -> sigma_types::AuditContext {
        sigma_types::AuditContext {
            auditor: (self.current_auditor)(),
            request_id: request_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        }
    }
}

/// Startup probe: ping the database and confirm a config snapshot has
/// loaded, for `/health` (spec §3 supplemented features).
pub async fn health_check(state: &AppState) -> Result<(), RepositoryError> {
    state.repository.count("__health__", &sigma_filter::FilterResult { where_clause: "TRUE".to_string(), params: vec![] }, true).await?;
    Ok(())
}
