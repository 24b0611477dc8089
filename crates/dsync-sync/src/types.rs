use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use dsync_store::StorePath;
use serde::Serialize;
use serde_json::Value;

/// Documents fetched in one cycle, keyed by store path.
pub type DocumentSet = BTreeMap<StorePath, Value>;

/// Lifecycle state of a synchronizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Created,
    Connecting,
    Fetching,
    Committing,
    Ready,
    Failed,
    Stopped,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Connecting => "connecting",
            Self::Fetching => "fetching",
            Self::Committing => "committing",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// What one commit installed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CommitReport {
    pub documents: usize,
    pub policies: usize,
    pub rules: usize,
}

/// Outcome of a successful start.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SyncReport {
    /// Connection attempts, including the successful one.
    pub attempts: usize,
    pub documents: usize,
    pub policies: usize,
    pub rules: usize,
    pub elapsed: Duration,
}
