// ── Types ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

/// Sync state of one tracked path. Exactly one value per path at any
/// instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// Cache and remote agreed as of the last transfer.
    Synced,
    /// Local changes not yet pushed.
    Pending,
    /// A transfer for this path is in flight.
    Syncing,
    /// The last attempt failed; waits for an explicit retry.
    Error,
}

impl SyncState {
    fn severity(self) -> u8 {
        match self {
            SyncState::Synced => 0,
            SyncState::Pending => 1,
            SyncState::Syncing => 2,
            SyncState::Error => 3,
        }
    }

    /// The more severe of two states: Error > Syncing > Pending > Synced.
    pub fn more_severe(self, other: SyncState) -> SyncState {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }
}

/// Typed per-path record. `content` is the source of truth for reads in
/// every state.
#[derive(Debug, Clone)]
pub(crate) struct CacheEntry {
    pub content: String,
    pub state: SyncState,
    /// Present only while `state == Error`.
    pub error: Option<String>,
    pub retry_count: u32,
}

impl CacheEntry {
    pub fn synced(content: String) -> Self {
        Self {
            content,
            state: SyncState::Synced,
            error: None,
            retry_count: 0,
        }
    }
}

impl Default for CacheEntry {
    fn default() -> Self {
        Self {
            content: String::new(),
            state: SyncState::Pending,
            error: None,
            retry_count: 0,
        }
    }
}

/// Receives every state transition, invoked outside the cache lock.
/// Implementors decide how to surface it (status bar, log line, channel).
pub trait SyncObserver: Send + Sync {
    fn state_changed(&self, path: &str, state: SyncState);
}
