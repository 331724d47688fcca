//! Errors raised while materializing endpoint descriptors.

/// Failures surfaced by `sigma-registry`.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A required child (`path`, `httpMethod`, `databaseCollection`) was
    /// missing under an endpoint's config subtree.
    #[error("endpoint '{endpoint}' is missing required field '{field}'")]
    MissingField {
        /// Config-tree name of the endpoint.
        endpoint: String,
        /// Name of the missing required field.
        field: String,
    },

    /// A field held a value that didn't parse (bad method token, bad
    /// integer, malformed `schema` reference, ...).
    #[error("endpoint '{endpoint}' field '{field}' has an invalid value: {reason}")]
    InvalidField {
        /// Config-tree name of the endpoint.
        endpoint: String,
        /// Name of the offending field.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// A `readFilter`/`writeFilter` entry named an unrecognized
    /// `$`-prefixed operator token; the whole endpoint is rejected, not
    /// silently dropped (spec §4.6 step 4).
    #[error("endpoint '{endpoint}' field '{field}' names an unknown operator token '{token}'")]
    UnknownOperatorToken {
        /// Config-tree name of the endpoint.
        endpoint: String,
        /// Filter field the token was attached to.
        field: String,
        /// The rejected token, verbatim.
        token: String,
    },

    /// Two path+method pairs resolve to the same route.
    #[error("path '{path}' with method {method:?} is already registered by endpoint '{existing}'")]
    DuplicateRoute {
        /// Colliding path.
        path: String,
        /// Colliding method.
        method: sigma_types::HttpMethod,
        /// Endpoint that already owns this route.
        existing: String,
    },

    /// The config store itself failed to answer a read.
    #[error("config store error: {0}")]
    Config(#[from] sigma_config::ConfigError),
}
