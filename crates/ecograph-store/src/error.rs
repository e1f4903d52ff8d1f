/// Errors from resource and resource-set operations.
///
/// Lookup misses are not errors: queries return `Option` or `bool`. These
/// variants cover loading and configuration failures only.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No registered or default loader accepts the URI.
    #[error("no loader registered for {0}")]
    NoLoader(String),

    /// A loader failed to populate a resource.
    #[error("failed to load {uri}: {reason}")]
    Load { uri: String, reason: String },

    /// A loader URI pattern is not a valid regular expression.
    #[error("invalid loader pattern {pattern:?}: {reason}")]
    InvalidLoaderPattern { pattern: String, reason: String },

    /// I/O error from a loader.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
