//! Directory access for dsync.
//!
//! A [`Connector`] opens authenticated sessions ([`DirectoryClient`]s) from a
//! [`ConnectionConfig`]. Sessions run [`SearchRequest`]s and return
//! [`DirectoryEntry`]s.
//!
//! # Implementations
//!
//! - [`LdapConnector`] -- dial, StartTLS, simple bind via `ldap3`
//! - [`InMemoryConnector`] -- entries held in an [`InMemoryDirectory`],
//!   with failure injection for tests
//!
//! # Design Rules
//!
//! 1. Connecting is all-or-nothing; a failed attempt leaves no session.
//! 2. Attribute names match case-insensitively.
//! 3. The bind password never appears in `Debug` output or errors.

pub mod client;
pub mod config;
pub mod entry;
pub mod error;
pub mod filter;
pub mod ldap;
pub mod memory;
pub mod search;

pub use client::{Connector, DirectoryClient};
pub use config::ConnectionConfig;
pub use entry::DirectoryEntry;
pub use error::{DirectoryError, DirectoryResult};
pub use filter::Filter;
pub use ldap::{LdapClient, LdapConnector};
pub use memory::{InMemoryClient, InMemoryConnector, InMemoryDirectory};
pub use search::{DerefAliases, Scope, SearchRequest};
