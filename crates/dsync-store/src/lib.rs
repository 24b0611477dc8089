//! Transactional storage for synchronized documents and policy modules.
//!
//! The store holds two namespaces:
//!
//! - a hierarchical **document namespace**: one JSON tree addressed by
//!   [`StorePath`]s such as `/cfg/a`
//! - a flat **policy module namespace**: raw policy sources keyed by module
//!   path (e.g. `pol1.rego`)
//!
//! Both namespaces are only reachable through a [`Transaction`]. A write
//! transaction stages its changes privately; they become visible to other
//! transactions all at once on commit, or never if the transaction is
//! aborted.
//!
//! # Storage Backends
//!
//! All backends implement the [`TransactionalStore`] trait:
//!
//! - [`InMemoryStore`] -- copy-on-write snapshot store for tests and embedding
//!
//! # Design Rules
//!
//! 1. No partial visibility: an aborted transaction leaves no trace.
//! 2. Readers never observe staged writes of a concurrent writer.
//! 3. Two write transactions that both commit must not silently interleave;
//!    the later commit fails with [`StoreError::Conflict`].
//! 4. Write operations on a read transaction are rejected.

pub mod error;
pub mod memory;
pub mod path;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::{InMemoryStore, InMemoryTxn};
pub use path::StorePath;
pub use traits::{run_transaction, Transaction, TransactionalStore, TxnMode, WriteOp};
