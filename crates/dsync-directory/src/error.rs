//! Directory client errors.
//!
//! Messages never include the bind password.

/// Errors from connecting to or searching a directory.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The connection parameters are unusable.
    #[error("invalid connection config: {0}")]
    Config(String),

    /// Dialing the server or upgrading the connection failed.
    #[error("directory connection failed: {0}")]
    Connection(String),

    /// The server rejected the bind credentials.
    #[error("directory bind failed: {0}")]
    Bind(String),

    /// A search could not be executed or returned a non-success result.
    #[error("directory search failed: {0}")]
    Search(String),

    /// The client was used after `close`.
    #[error("directory connection is closed")]
    Closed,

    /// Underlying ldap3 error.
    #[error("ldap error: {0}")]
    Ldap3(#[from] ldap3::LdapError),
}

impl DirectoryError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn search(msg: impl Into<String>) -> Self {
        Self::Search(msg.into())
    }

    /// Whether this error happened while establishing a session (dial,
    /// TLS upgrade, bind) rather than while using one.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Connection(_) | Self::Bind(_) | Self::Closed
        )
    }
}

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(DirectoryError::connection("refused").is_connection_error());
        assert!(DirectoryError::Bind("invalid credentials".into()).is_connection_error());
        assert!(!DirectoryError::search("size limit").is_connection_error());
        assert!(DirectoryError::Closed.is_connection_error());
    }
}
