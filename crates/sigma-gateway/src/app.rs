//! Axum router wiring: dynamic dispatch through the endpoint registry
//! plus the two supplemented operational endpoints (spec §6, SPEC_FULL
//! §3 "Supplemented features").

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::any;
use axum::Router;
use tower_http::trace::TraceLayer;

use sigma_types::{Endpoint, HttpMethod};

use crate::error::GatewayError;
use crate::request::{parse_post_read_request, parse_query_request, parse_write_request};
use crate::state::{health_check, AppState};
use crate::timefmt::TimeFormat;
use crate::{query, response, write};

/// Build the full axum application (spec §6 HTTP surface table).
pub fn build_router(state: AppState, started_at: Instant) -> Router {
    let status_path = format!("{}/_status", state.api_prefix);
    Router::new()
        .route("/health", any(liveness))
        .route(&status_path, any(status_summary))
        .fallback(dispatch)
        .layer(TraceLayer::new_for_http())
        .with_state(AppStateWithStart { inner: state, started_at })
}

#[derive(Clone)]
struct AppStateWithStart {
    inner: AppState,
    started_at: Instant,
}

async fn liveness(State(state): State<AppStateWithStart>) -> Response {
    match health_check(&state.inner).await {
        Ok(()) => (StatusCode::OK, "OK").into_response(),
        Err(e) => {
            tracing::error!(error = %e, "liveness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE").into_response()
        }
    }
}

async fn status_summary(State(state): State<AppStateWithStart>) -> Response {
    let table = state.inner.endpoints.current();
    let body = serde_json::json!({
        "endpointCount": table.endpoint_count(),
        "uptimeSeconds": state.started_at.elapsed().as_secs(),
        "enumCatalogStale": state.inner.enum_catalog.writes_blocked(),
        "enumCatalogGeneration": state.inner.enum_catalog.generation(),
        "configGeneration": state.inner.endpoints.generation(),
        "lastConfigReloadAt": state.inner.endpoints.last_reload_at().to_rfc3339(),
    });
    Json(body).into_response()
}

/// One handler for every dynamically routed endpoint path: resolve
/// `(method, path)` against the current route table, parse the request
/// body, and dispatch to the query or write pipeline (spec §4.6 step 5,
/// §4.7).
async fn dispatch(
    State(state): State<AppStateWithStart>,
    headers: HeaderMap,
    method: axum::http::Method,
    uri: axum::http::Uri,
    body: Bytes,
) -> Response {
    let state = state.inner;
    let path = uri.path().to_string();
    let query_string = uri.query().unwrap_or("").to_string();

    let Some(method) = to_http_method(&method) else {
        return GatewayError::MethodNotAllowed.into_response();
    };

    let table = state.endpoints.current();
    let endpoint = match table.resolve(method, &path) {
        Some(endpoint) => endpoint.clone(),
        None if table.path_exists(&path) => return GatewayError::MethodNotAllowed.into_response(),
        None => return GatewayError::NotFound.into_response(),
    };
    drop(table);

    let request_id = headers.get("x-request-id").and_then(|v| v.to_str().ok()).map(str::to_string);
    let time_format = TimeFormat::parse(headers.get("x-time-format").and_then(|v| v.to_str().ok()));
    let span = tracing::info_span!("request", request_id = request_id.as_deref().unwrap_or(""), endpoint = %endpoint.name);
    let _entered = span.enter();

    let is_write = method != HttpMethod::Get && endpoint.allows_write(method);
    let result = if is_write {
        handle_write(&state, &endpoint, method, &headers, request_id, &query_string, &body).await
    } else if endpoint.allows_read(method) {
        handle_read(&state, &endpoint, method, &query_string, &body, time_format).await
    } else {
        Err(GatewayError::MethodNotAllowed)
    };

    result.unwrap_or_else(IntoResponse::into_response)
}

/// `GET` reads the filter off the query string; a `POST` endpoint that
/// isn't configured for writes instead reads it from the body, since a
/// body can express the nested `and`/`or`/`nor` trees a query string
/// can't (spec §6 "`POST` ... read (complex filter) OR create").
async fn handle_read(
    state: &AppState,
    endpoint: &Endpoint,
    method: HttpMethod,
    query_string: &str,
    body: &Bytes,
    time_format: TimeFormat,
) -> Result<Response, GatewayError> {
    let parsed = if method == HttpMethod::Post {
        let body_value: serde_json::Value = if body.is_empty() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_slice(body).map_err(|e| GatewayError::Validation(vec![format!("malformed JSON body: {e}")]))?
        };
        parse_post_read_request(endpoint, query_string, &body_value)?
    } else {
        parse_query_request(endpoint, query_string)?
    };
    let outcome = query::execute_query(state, endpoint, parsed).await?;
    let (bindings, catalog) = enum_context(state, endpoint);
    Ok(response::render_query(outcome, &bindings, &catalog, time_format))
}

#[allow(clippy::too_many_arguments)]
async fn handle_write(
    state: &AppState,
    endpoint: &Endpoint,
    method: HttpMethod,
    headers: &HeaderMap,
    request_id: Option<String>,
    query_string: &str,
    body: &Bytes,
) -> Result<Response, GatewayError> {
    let body_value: serde_json::Value = if body.is_empty() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        serde_json::from_slice(body).map_err(|e| GatewayError::Validation(vec![format!("malformed JSON body: {e}")]))?
    };

    let parsed = parse_write_request(method, query_string, body_value)?;
    let expected_version = headers
        .get("if-match")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim_matches('"').parse::<i64>().ok());
    let audit = state.audit_context(request_id);

    let outcome = write::execute_write(state, endpoint, &audit, expected_version, parsed).await?;
    Ok(response::render_write(outcome))
}

fn enum_context(state: &AppState, endpoint: &Endpoint) -> (Vec<sigma_schema::EnumBinding>, Arc<sigma_schema::EnumCatalog>) {
    let catalog = state.enum_catalog.current();
    let bindings = endpoint
        .schema_ref
        .as_ref()
        .and_then(|schema_ref| state.schemas.get(&schema_ref.name))
        .map(|doc| sigma_schema::discover_bindings(&doc))
        .unwrap_or_default();
    (bindings, catalog)
}

fn to_http_method(method: &axum::http::Method) -> Option<HttpMethod> {
    match method.as_str() {
        "GET" => Some(HttpMethod::Get),
        "POST" => Some(HttpMethod::Post),
        "PUT" => Some(HttpMethod::Put),
        "PATCH" => Some(HttpMethod::Patch),
        "DELETE" => Some(HttpMethod::Delete),
        _ => None,
    }
}
