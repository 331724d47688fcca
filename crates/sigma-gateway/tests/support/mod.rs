//! Shared fixture for `sigma-gateway` end-to-end tests: a real
//! `FsConfigStore` over a temp directory, an in-memory sqlite
//! repository, and the full axum router built the same way `main.rs`
//! builds it — only the process-level startup plumbing is skipped.

use std::sync::Arc;
use std::time::Instant;

use axum::body::{to_bytes, Body};
use axum::http::{Request, Response, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use sigma_config::FsConfigStore;
use sigma_filter::OperatorRegistry;
use sigma_gateway::state::AppState;
use sigma_registry::EndpointRegistry;
use sigma_repository::{DocumentRepository, SqliteRepository};
use sigma_schema::{EnumCatalogHandle, SchemaRegistry};

/// Write a leaf value at `dir/relative`, creating parent directories.
fn write_leaf(dir: &std::path::Path, relative: &str, value: &str) {
    let path = dir.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, value).unwrap();
}

/// Build the config tree backing every test in this module:
/// `/api/widgets` (sequence-enabled, a `status` filter field on both
/// directions, a bound schema) and `/api/widgets/:id/items` as a nested
/// sub-entity endpoint.
fn write_endpoint_tree(dir: &std::path::Path) {
    write_leaf(dir, "endpoints/widgets/path", "/widgets");
    write_leaf(dir, "endpoints/widgets/httpMethod", "GET");
    write_leaf(dir, "endpoints/widgets/writeMethods", "POST,PATCH,PUT,DELETE");
    write_leaf(dir, "endpoints/widgets/databaseCollection", "widgets");
    write_leaf(dir, "endpoints/widgets/sequenceEnabled", "true");
    write_leaf(dir, "endpoints/widgets/defaultBulkSize", "10");
    write_leaf(dir, "endpoints/widgets/schema", "widget");
    write_leaf(dir, "endpoints/widgets/subEntities", "items");
    write_leaf(dir, "endpoints/widgets/readFilter/status", "$eq,$in");
    write_leaf(dir, "endpoints/widgets/writeFilter/status", "$eq");

    // A POST-only read sibling over the same collection, for the
    // complex-filter-via-body path (spec §6 "`POST` ... read (complex
    // filter) OR create" — `widgets` itself can't exercise this since
    // its POST is a write method).
    write_leaf(dir, "endpoints/widgets-search/path", "/widgets/search");
    write_leaf(dir, "endpoints/widgets-search/httpMethod", "POST");
    write_leaf(dir, "endpoints/widgets-search/databaseCollection", "widgets");
    write_leaf(dir, "endpoints/widgets-search/readFilter/status", "$eq,$in");
}

fn widget_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "required": ["name"],
        "properties": {
            "name": {"type": "string"},
            "status": {"enumRef": "status"}
        }
    })
}

/// Build the full router plus the temp dir it reads config from (the
/// dir must outlive the router, so it's returned alongside it).
pub async fn test_app() -> (axum::Router, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    write_endpoint_tree(dir.path());
    let store = FsConfigStore::open(dir.path()).unwrap();

    let endpoint_registry = Arc::new(EndpointRegistry::new(&store, "/api", "/endpoints"));

    let schema_registry = Arc::new(SchemaRegistry::default());
    schema_registry.register("widget", widget_schema());

    let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
    let repository = SqliteRepository::new(pool);
    repository.ensure_schema().await.unwrap();

    let enum_catalog = Arc::new(EnumCatalogHandle::new(false));

    let state = AppState {
        repository: Arc::new(repository),
        operators: Arc::new(OperatorRegistry::default()),
        endpoints: endpoint_registry,
        schemas: schema_registry,
        enum_catalog,
        current_auditor: Arc::new(|| "tester".to_string()),
        api_prefix: "/api".to_string(),
    };

    let app = sigma_gateway::app::build_router(state, Instant::now());
    (app, dir)
}

pub async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let body = match body {
        Some(value) => Body::from(serde_json::to_vec(&value).unwrap()),
        None => Body::empty(),
    };
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();

    let response: Response<Body> = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
    (status, json)
}
