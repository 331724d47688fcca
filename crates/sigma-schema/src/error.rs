//! Errors raised by schema compilation, validation, and the enum
//! catalog refresher.

/// A single JSON Schema validation failure, with the JSON Pointer to
/// the offending instance location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// JSON Pointer into the validated document.
    pub instance_path: String,
    /// Human-readable description of the violation.
    pub message: String,
}

/// Failures surfaced by `sigma-schema`.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// No schema registered under this name.
    #[error("unknown schema '{0}'")]
    UnknownSchema(String),

    /// The schema document itself didn't compile under Draft 2020-12.
    #[error("schema '{name}' does not compile: {reason}")]
    InvalidSchema {
        /// Offending schema's registered name.
        name: String,
        /// Compiler's error text.
        reason: String,
    },

    /// An `enumRef: "x"` placeholder in a schema named a catalog entry
    /// that doesn't exist.
    #[error("schema '{schema}' references unknown enum '{enum_name}'")]
    UnknownEnum {
        /// Schema that referenced the missing enum.
        schema: String,
        /// Enum name that wasn't in the catalog.
        enum_name: String,
    },

    /// `FailOnEnumLoadFailure` is set and the last enum refresh failed,
    /// so writes to enum-referencing endpoints are refused until the
    /// next successful refresh.
    #[error("enum catalog is stale and FailOnEnumLoadFailure is set")]
    EnumCatalogStale,

    /// `validate`/`validate_bulk` found one or more violations.
    #[error("document failed schema validation: {0:?}")]
    Invalid(Vec<ValidationIssue>),

    /// The enum refresher's HTTP call failed.
    #[error("enum catalog refresh failed: {0}")]
    Refresh(#[from] reqwest::Error),
}
