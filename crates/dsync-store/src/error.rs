/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A path string could not be parsed.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// The operation requires a document that does not exist.
    #[error("document not found: {0}")]
    NotFound(String),

    /// The write collides with existing content of an incompatible shape.
    #[error("write conflict at {path}: {reason}")]
    WriteConflict { path: String, reason: String },

    /// A write was attempted through a read transaction.
    #[error("transaction {0} is read-only")]
    ReadOnly(u64),

    /// Another write transaction committed after this one began.
    #[error("transaction {0} conflicts with a concurrent commit")]
    Conflict(u64),

    /// Unexpected backend failure (poisoned lock, invariant breach).
    #[error("internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    pub(crate) fn write_conflict(path: impl ToString, reason: impl Into<String>) -> Self {
        Self::WriteConflict {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
