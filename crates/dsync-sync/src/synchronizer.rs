use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use dsync_directory::{Connector, DirectoryClient};
use dsync_store::TransactionalStore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::commit::commit;
use crate::config::{ConfigCell, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::mapper::RecordMapper;
use crate::retry::{connect_with_retry, Connected};
use crate::types::{CommitReport, SyncReport, SyncState};

/// Pulls documents and policies from a directory into a store.
///
/// One synchronizer runs exactly one cycle: `start` connects (retrying),
/// fetches both record categories and commits them atomically. The session
/// stays open until `stop`.
///
/// ```text
/// Created -> Connecting -> Fetching -> Committing -> Ready
///                 |            |            |
///                 +------------+------------+--> Failed
/// any state --stop--> Stopped
/// ```
///
/// `Stopped` is final: a `start` still in flight when `stop` runs gives up,
/// closes any session it opened and returns [`SyncError::Cancelled`].
pub struct Synchronizer<C: Connector, S> {
    connector: C,
    store: Arc<S>,
    config: ConfigCell,
    state: Mutex<SyncState>,
    client: tokio::sync::Mutex<Option<C::Client>>,
    shutdown: CancellationToken,
}

impl<C, S> Synchronizer<C, S>
where
    C: Connector,
    S: TransactionalStore,
{
    pub fn new(config: SyncConfig, connector: C, store: Arc<S>) -> SyncResult<Self> {
        config.validate()?;
        Ok(Self {
            connector,
            store,
            config: ConfigCell::new(config),
            state: Mutex::new(SyncState::Created),
            client: tokio::sync::Mutex::new(None),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn state(&self) -> SyncState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> Arc<SyncConfig> {
        self.config.snapshot()
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    fn set_state(&self, next: SyncState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Move to `next` unless `stop` already ran. Returns whether it moved.
    fn advance(&self, next: SyncState) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == SyncState::Stopped {
            return false;
        }
        *state = next;
        true
    }

    /// Run the sync cycle. Blocks until connected; only connection failures
    /// are retried. Fetch and commit failures leave the synchronizer in
    /// `Failed` with the session still held until `stop`.
    pub async fn start(&self, cancel: &CancellationToken) -> SyncResult<SyncReport> {
        let started = Instant::now();
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state != SyncState::Created {
                return Err(SyncError::InvalidState {
                    operation: "start",
                    state: *state,
                });
            }
            *state = SyncState::Connecting;
        }
        info!(address = %self.config.snapshot().connection.address, "starting directory sync");

        let connected = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(SyncError::Cancelled),
            result = connect_with_retry(&self.connector, &self.config, cancel) => result,
        };
        let Connected {
            mut client,
            attempts,
        } = match connected {
            Ok(connected) => connected,
            Err(err) => {
                self.advance(match err {
                    SyncError::Cancelled => SyncState::Stopped,
                    _ => SyncState::Failed,
                });
                error!(error = %err, "directory sync did not connect");
                return Err(err);
            }
        };

        let outcome = if self.advance(SyncState::Fetching) {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => Err(SyncError::Cancelled),
                result = self.run_cycle(&mut client) => result,
            }
        } else {
            Err(SyncError::Cancelled)
        };

        {
            let mut slot = self.client.lock().await;
            if self.shutdown.is_cancelled() {
                drop(slot);
                if let Err(err) = client.close().await {
                    warn!(error = %err, "closing directory connection failed");
                }
                self.set_state(SyncState::Stopped);
                info!("directory sync stopped before it finished");
                return Err(SyncError::Cancelled);
            }
            *slot = Some(client);
        }

        match outcome {
            Ok(_) if !self.advance(SyncState::Ready) => Err(SyncError::Cancelled),
            Ok(committed) => {
                let report = SyncReport {
                    attempts,
                    documents: committed.documents,
                    policies: committed.policies,
                    rules: committed.rules,
                    elapsed: started.elapsed(),
                };
                info!(
                    attempts,
                    documents = report.documents,
                    policies = report.policies,
                    elapsed = ?report.elapsed,
                    "directory sync ready"
                );
                Ok(report)
            }
            Err(err) => {
                self.advance(SyncState::Failed);
                error!(error = %err, kind = %err.kind(), "directory sync failed");
                Err(err)
            }
        }
    }

    async fn run_cycle(&self, client: &mut C::Client) -> SyncResult<CommitReport> {
        let config = self.config.snapshot();
        let mapper = RecordMapper::from_config(&config);
        let documents = mapper.fetch_documents(client).await?;
        let policies = mapper.fetch_policies(client).await?;

        if !self.advance(SyncState::Committing) {
            return Err(SyncError::Cancelled);
        }
        commit(self.store.as_ref(), &documents, &policies, &config.compiler)
    }

    /// Release the directory session and abandon any `start` in flight.
    /// Close errors are logged, not returned.
    pub async fn stop(&self) {
        self.shutdown.cancel();
        if let Some(mut client) = self.client.lock().await.take() {
            if let Err(err) = client.close().await {
                warn!(error = %err, "closing directory connection failed");
            }
        }
        self.set_state(SyncState::Stopped);
        info!("directory sync stopped");
    }

    /// Replace the configuration. Takes effect on the next connection
    /// attempt; never triggers a sync on its own.
    pub fn reconfigure(&self, config: SyncConfig) -> SyncResult<()> {
        config.validate()?;
        let address = config.connection.address.clone();
        self.config.replace(config);
        info!(address = %address, "directory sync reconfigured");
        Ok(())
    }
}
