//! Errors raised by the config store client.

/// Failures reading or watching the configuration tree.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The underlying filesystem operation failed.
    #[error("config store I/O error at '{path}': {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A path argument wasn't a valid ZooKeeper-style absolute path
    /// (`/a/b/c`, no trailing slash, no empty segments).
    #[error("malformed config path: '{0}'")]
    MalformedPath(String),

    /// The filesystem watcher failed to start.
    #[error("failed to start config store watcher: {0}")]
    Watch(#[from] notify::Error),
}
