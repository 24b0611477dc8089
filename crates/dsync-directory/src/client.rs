use async_trait::async_trait;

use crate::config::ConnectionConfig;
use crate::entry::DirectoryEntry;
use crate::error::DirectoryResult;
use crate::search::SearchRequest;

/// An established, authenticated directory session.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Run a search and return every matching entry.
    async fn search(&mut self, request: &SearchRequest) -> DirectoryResult<Vec<DirectoryEntry>>;

    /// Release the session. Further searches fail with
    /// [`DirectoryError::Closed`](crate::DirectoryError::Closed).
    async fn close(&mut self) -> DirectoryResult<()>;
}

/// Opens directory sessions.
///
/// A connect attempt is all-or-nothing: on error no session is left open.
#[async_trait]
pub trait Connector: Send + Sync {
    type Client: DirectoryClient + 'static;

    async fn connect(&self, config: &ConnectionConfig) -> DirectoryResult<Self::Client>;
}
