//! Error taxonomy for status tree operations

use thiserror::Error;

/// Result type for status tree operations
pub type StatusResult<T> = Result<T, StatusError>;

/// Errors surfaced synchronously by the status tree
///
/// None of these are fatal: a failed mutating call always leaves the tree
/// unchanged, and the caller decides whether to retry, default or drop.
#[derive(Debug, Error)]
pub enum StatusError {
    /// Address does not have the `scheme://` form
    #[error("invalid url '{url}': expected scheme://path")]
    InvalidUrl { url: String },

    /// Address contains an empty interior segment (`a//b`)
    #[error("invalid url '{url}': empty path segment")]
    EmptySegment { url: String },

    /// Address uses a scheme the store does not serve
    #[error("invalid url '{url}': scheme must be '{expected}'")]
    SchemeMismatch { url: String, expected: String },

    /// Wildcard used by an operation that needs a concrete address
    #[error("wildcard not allowed in '{url}'")]
    WildcardNotAllowed { url: String },

    /// A segment of the address does not exist
    #[error("node not found: {url}")]
    NotFound { url: String },

    /// A scalar or list sits where a container is required
    #[error("node is not a container: {url}")]
    NotContainer { url: String },

    /// Optimistic check failed
    #[error("revision mismatch at {url}: expected {expected}, found {actual}")]
    RevisionMismatch {
        url: String,
        expected: u64,
        actual: u64,
    },

    /// Create-only write found an existing node
    #[error("node already exists: {url}")]
    AlreadyExists { url: String },

    /// Value outside the scalar/list/container model
    #[error("unsupported value at {url}: {reason}")]
    UnsupportedValue { url: String, reason: String },

    /// Revision argument is neither a sentinel nor an integer
    #[error("invalid revision '{value}': expected an integer, 'unchecked' or 'must_not_exist'")]
    InvalidRevision { value: String },

    /// JSON text could not be encoded or decoded
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StatusError {
    /// True for missing nodes, the "value not set" case
    pub fn is_not_found(&self) -> bool {
        matches!(self, StatusError::NotFound { .. })
    }

    /// True when an optimistic check rejected the write
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StatusError::RevisionMismatch { .. } | StatusError::AlreadyExists { .. }
        )
    }

    /// True for malformed addresses
    pub fn is_invalid_url(&self) -> bool {
        matches!(
            self,
            StatusError::InvalidUrl { .. }
                | StatusError::EmptySegment { .. }
                | StatusError::SchemeMismatch { .. }
                | StatusError::WildcardNotAllowed { .. }
        )
    }
}
