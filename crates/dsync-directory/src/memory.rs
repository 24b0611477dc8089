//! In-memory directory for tests and embedding.
//!
//! [`InMemoryDirectory`] holds entries; [`InMemoryConnector`] hands out
//! sessions against it and can be told to fail a number of connection
//! attempts first.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use tracing::debug;

use crate::client::{Connector, DirectoryClient};
use crate::config::ConnectionConfig;
use crate::entry::DirectoryEntry;
use crate::error::{DirectoryError, DirectoryResult};
use crate::search::{Scope, SearchRequest};

// ---------------------------------------------------------------------------
// InMemoryDirectory
// ---------------------------------------------------------------------------

/// A shared set of directory entries.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    entries: RwLock<Vec<DirectoryEntry>>,
    search_failure: RwLock<Option<String>>,
    searches: AtomicUsize,
    closes: AtomicUsize,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: impl IntoIterator<Item = DirectoryEntry>) -> Self {
        let directory = Self::new();
        for entry in entries {
            directory.add_entry(entry);
        }
        directory
    }

    /// Append an entry. Search results keep insertion order.
    pub fn add_entry(&self, entry: DirectoryEntry) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Make every search fail with `message` until reset with `None`.
    pub fn set_search_failure(&self, message: Option<&str>) {
        *self
            .search_failure
            .write()
            .unwrap_or_else(PoisonError::into_inner) = message.map(String::from);
    }

    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Evaluate a search against the current entries.
    pub fn search(&self, request: &SearchRequest) -> DirectoryResult<Vec<DirectoryEntry>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self
            .search_failure
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(DirectoryError::search(message));
        }

        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .iter()
            .filter(|e| in_scope(&e.dn, &request.base, request.scope))
            .filter(|e| request.filter.matches(e))
            .map(|e| select_attrs(e, &request.attrs))
            .collect())
    }
}

fn in_scope(dn: &str, base: &str, scope: Scope) -> bool {
    let dn = dn.to_ascii_lowercase();
    let base = base.to_ascii_lowercase();
    if dn == base {
        return scope != Scope::OneLevel;
    }
    let Some(rest) = dn.strip_suffix(&base).and_then(|r| r.strip_suffix(',')) else {
        return base.is_empty() && scope == Scope::Subtree;
    };
    match scope {
        Scope::Base => false,
        Scope::OneLevel => !rest.contains(','),
        Scope::Subtree => true,
    }
}

fn select_attrs(entry: &DirectoryEntry, attrs: &[String]) -> DirectoryEntry {
    if attrs.is_empty() {
        return entry.clone();
    }
    let wanted = |name: &str| attrs.iter().any(|a| a.eq_ignore_ascii_case(name));
    DirectoryEntry {
        dn: entry.dn.clone(),
        attrs: entry
            .attrs
            .iter()
            .filter(|(k, _)| wanted(k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        bin_attrs: entry
            .bin_attrs
            .iter()
            .filter(|(k, _)| wanted(k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// InMemoryConnector
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ConnectorState {
    failures_left: AtomicUsize,
    attempts: AtomicUsize,
    credentials: Option<(String, String)>,
    addresses: Mutex<Vec<String>>,
}

/// Connects to an [`InMemoryDirectory`]. Clones share counters.
#[derive(Clone, Debug)]
pub struct InMemoryConnector {
    directory: Arc<InMemoryDirectory>,
    state: Arc<ConnectorState>,
}

impl InMemoryConnector {
    pub fn new(directory: Arc<InMemoryDirectory>) -> Self {
        Self {
            directory,
            state: Arc::default(),
        }
    }

    /// Fail the first `n` connection attempts. `usize::MAX` never connects.
    pub fn failing_first(self, n: usize) -> Self {
        self.state.failures_left.store(n, Ordering::SeqCst);
        self
    }

    /// Only accept binds with these credentials.
    pub fn with_credentials(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        let state = ConnectorState {
            failures_left: AtomicUsize::new(self.state.failures_left.load(Ordering::SeqCst)),
            attempts: AtomicUsize::new(self.state.attempts.load(Ordering::SeqCst)),
            credentials: Some((username.into(), password.into())),
            addresses: Mutex::default(),
        };
        Self {
            directory: self.directory,
            state: Arc::new(state),
        }
    }

    pub fn directory(&self) -> &Arc<InMemoryDirectory> {
        &self.directory
    }

    /// Number of `connect` calls so far, failed or not.
    pub fn attempts(&self) -> usize {
        self.state.attempts.load(Ordering::SeqCst)
    }

    /// Addresses of every connect attempt, in order.
    pub fn addresses(&self) -> Vec<String> {
        self.state
            .addresses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Connector for InMemoryConnector {
    type Client = InMemoryClient;

    async fn connect(&self, config: &ConnectionConfig) -> DirectoryResult<InMemoryClient> {
        let attempt = self.state.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        self.state
            .addresses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(config.address.clone());
        config.validate()?;

        let failing = self
            .state
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            debug!(attempt, "simulated connection failure");
            return Err(DirectoryError::connection(format!(
                "{}: connection refused",
                config.address
            )));
        }

        if let Some((username, password)) = &self.state.credentials {
            if *username != config.username || *password != config.password {
                return Err(DirectoryError::Bind("invalid credentials".into()));
            }
        }

        Ok(InMemoryClient {
            directory: Arc::clone(&self.directory),
            closed: false,
        })
    }
}

/// A session against an [`InMemoryDirectory`].
#[derive(Debug)]
pub struct InMemoryClient {
    directory: Arc<InMemoryDirectory>,
    closed: bool,
}

#[async_trait]
impl DirectoryClient for InMemoryClient {
    async fn search(&mut self, request: &SearchRequest) -> DirectoryResult<Vec<DirectoryEntry>> {
        if self.closed {
            return Err(DirectoryError::Closed);
        }
        self.directory.search(request)
    }

    async fn close(&mut self) -> DirectoryResult<()> {
        if !self.closed {
            self.closed = true;
            self.directory.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
