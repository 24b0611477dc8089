use dsync_directory::Connector;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ConfigCell;
use crate::error::{SyncError, SyncResult};

/// A session plus the number of attempts it took to open.
pub struct Connected<T> {
    pub client: T,
    pub attempts: usize,
}

/// Connect, retrying at the configured fixed interval until a session is
/// established, `max_attempts` is reached, or `cancel` fires.
///
/// The configuration is re-read from `config` before every attempt, so a
/// reconfigure takes effect on the next try. Cancellation is observed
/// before each attempt, during the attempt and during the pause.
pub async fn connect_with_retry<C: Connector>(
    connector: &C,
    config: &ConfigCell,
    cancel: &CancellationToken,
) -> SyncResult<Connected<C::Client>> {
    let mut attempt = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        attempt += 1;
        let snapshot = config.snapshot();

        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(SyncError::Cancelled),
            result = connector.connect(&snapshot.connection) => result,
        };

        let err = match result {
            Ok(client) => {
                info!(
                    attempt,
                    address = %snapshot.connection.address,
                    "connected to directory"
                );
                return Ok(Connected {
                    client,
                    attempts: attempt,
                });
            }
            Err(err) => err,
        };

        if snapshot.retry.max_attempts.is_some_and(|max| attempt >= max) {
            return Err(SyncError::ConnectExhausted {
                attempts: attempt,
                last: err,
            });
        }

        let interval = snapshot.retry.interval();
        warn!(
            attempt,
            address = %snapshot.connection.address,
            error = %err,
            retry_in = ?interval,
            "directory connection failed, retrying"
        );
        tokio::select! {
            _ = cancel.cancelled() => return Err(SyncError::Cancelled),
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
