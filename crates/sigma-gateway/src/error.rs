//! Gateway-wide error type and its HTTP surface (spec §7 "Error handling
//! design").

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use sigma_filter::FilterError;
use sigma_repository::RepositoryError;
use sigma_schema::SchemaError;

/// Every failure mode the gateway's request handlers can return,
/// carrying enough detail to render the `{error, details[]}` body spec
/// §7 requires.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// No endpoint matches `(method, path)`.
    #[error("no endpoint matches this path")]
    NotFound,

    /// An endpoint exists at this path but not for this HTTP method.
    #[error("method not allowed for this endpoint")]
    MethodNotAllowed,

    /// Filter parse/validate/translate failures, or schema validation
    /// failures — both report every offending entry (spec §8 property 6).
    #[error("validation failed")]
    Validation(Vec<String>),

    /// Optimistic concurrency conflict: the caller's expected version
    /// doesn't match the persisted one.
    #[error("version conflict: expected {expected}, found {actual}")]
    Conflict {
        /// Version the caller supplied via `If-Match`.
        expected: i64,
        /// Version actually persisted.
        actual: i64,
    },

    /// A dependency this request needed (enum service, database) is
    /// unreachable or degraded.
    #[error("upstream dependency unavailable: {0}")]
    Upstream(String),

    /// Anything else — a bug, an unexpected driver error, ...
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    details: Vec<String>,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            GatewayError::NotFound => (StatusCode::NOT_FOUND, self.to_string(), vec![]),
            GatewayError::MethodNotAllowed => (StatusCode::METHOD_NOT_ALLOWED, self.to_string(), vec![]),
            GatewayError::Validation(details) => (StatusCode::BAD_REQUEST, "validation failed".to_string(), details.clone()),
            GatewayError::Conflict { .. } => (StatusCode::CONFLICT, self.to_string(), vec![]),
            GatewayError::Upstream(_) => (StatusCode::SERVICE_UNAVAILABLE, self.to_string(), vec![]),
            GatewayError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string(), vec![]),
        };
        (status, Json(ErrorBody { error, details })).into_response()
    }
}

impl From<Vec<FilterError>> for GatewayError {
    fn from(errors: Vec<FilterError>) -> Self {
        GatewayError::Validation(errors.iter().map(ToString::to_string).collect())
    }
}

impl From<RepositoryError> for GatewayError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => GatewayError::NotFound,
            RepositoryError::VersionConflict { expected, actual } => GatewayError::Conflict { expected, actual },
            RepositoryError::Filter(errors) => errors.into(),
            other => GatewayError::Internal(other.to_string()),
        }
    }
}

impl From<SchemaError> for GatewayError {
    fn from(e: SchemaError) -> Self {
        match e {
            SchemaError::Invalid(issues) => {
                GatewayError::Validation(issues.into_iter().map(|i| format!("{}: {}", i.instance_path, i.message)).collect())
            }
            SchemaError::EnumCatalogStale => GatewayError::Upstream("enum catalog is stale".to_string()),
            SchemaError::Refresh(e) => GatewayError::Upstream(e.to_string()),
            other => GatewayError::Internal(other.to_string()),
        }
    }
}
