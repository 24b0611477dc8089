//! Directory-to-store synchronization.
//!
//! A [`Synchronizer`] connects to a directory service (retrying until it
//! succeeds), pulls two kinds of records through a [`RecordMapper`], and
//! installs them into a [`TransactionalStore`](dsync_store::TransactionalStore)
//! in one transaction:
//!
//! - **documents**: JSON values placed at a store path
//! - **policies**: policy module sources, compiled as a set before any of
//!   them is persisted
//!
//! # Design Rules
//!
//! 1. Only connection failures are retried. Fetch, decode, compile and
//!    store failures end the cycle.
//! 2. A cycle commits everything or nothing.
//! 3. Documents are staged before compilation, so rules are checked
//!    against the data they would shadow.
//! 4. The configuration is re-read before every connection attempt.
//! 5. Records are merged with overwrite; nothing is ever deleted.

pub mod commit;
pub mod config;
pub mod error;
pub mod mapper;
pub mod plugin;
pub mod retry;
pub mod synchronizer;
pub mod types;

pub use commit::commit;
pub use config::{ConfigCell, RecordSchema, RetryPolicy, SyncConfig};
pub use error::{ErrorKind, SyncError, SyncResult};
pub use mapper::RecordMapper;
pub use plugin::{Plugin, PluginContext, PluginFactory, SynchronizerFactory, PLUGIN_NAME};
pub use retry::{connect_with_retry, Connected};
pub use synchronizer::Synchronizer;
pub use types::{CommitReport, DocumentSet, SyncReport, SyncState};
