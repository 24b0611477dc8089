use std::fmt;

use dsync_directory::DirectoryError;
use dsync_policy::{CompileErrors, ParseError};
use dsync_store::StoreError;
use thiserror::Error;

use crate::types::SyncState;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("directory connection failed: {0}")]
    Connection(#[source] DirectoryError),

    #[error("gave up connecting after {attempts} attempts: {last}")]
    ConnectExhausted {
        attempts: usize,
        #[source]
        last: DirectoryError,
    },

    #[error("directory search failed: {0}")]
    Search(#[source] DirectoryError),

    #[error("entry {dn}: invalid JSON content: {source}")]
    Decode {
        dn: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("entry {dn}: missing attribute {attribute}")]
    MissingAttribute { dn: String, attribute: String },

    #[error("entry {dn}: invalid document path {path:?}: {reason}")]
    InvalidDocumentPath {
        dn: String,
        path: String,
        reason: String,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("policy compilation failed: {0}")]
    Compile(#[from] CompileErrors),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("synchronization cancelled")]
    Cancelled,

    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: SyncState,
    },
}

/// Directory errors split by phase: establishing a session is a
/// connection failure, anything after that is a search failure.
impl From<DirectoryError> for SyncError {
    fn from(err: DirectoryError) -> Self {
        if err.is_connection_error() {
            Self::Connection(err)
        } else {
            Self::Search(err)
        }
    }
}

/// Coarse classification of a [`SyncError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connection,
    Search,
    Decode,
    Parse,
    Compile,
    Store,
    Config,
    Cancelled,
    State,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connection => "connection",
            Self::Search => "search",
            Self::Decode => "decode",
            Self::Parse => "parse",
            Self::Compile => "compile",
            Self::Store => "store",
            Self::Config => "config",
            Self::Cancelled => "cancelled",
            Self::State => "state",
        };
        f.write_str(s)
    }
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection(_) | Self::ConnectExhausted { .. } => ErrorKind::Connection,
            Self::Search(_) => ErrorKind::Search,
            Self::Decode { .. } | Self::MissingAttribute { .. } | Self::InvalidDocumentPath { .. } => {
                ErrorKind::Decode
            }
            Self::Parse(_) => ErrorKind::Parse,
            Self::Compile(_) => ErrorKind::Compile,
            Self::Store(_) => ErrorKind::Store,
            Self::Config(_) => ErrorKind::Config,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::InvalidState { .. } => ErrorKind::State,
        }
    }

    /// Whether the start sequence retries this error. Only connection
    /// failures are retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
