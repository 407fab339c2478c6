// ── SyncEngine – write-back cache reconciled with a remote project tree ──────

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use log::{debug, warn};
use telesync_core::path::{join_remote, validate_rel_path};
use telesync_core::{RemoteError, RemoteResult};
use telesync_ssh::{CommandOutput, SharedExec};

use super::commands;
use super::types::{CacheEntry, SyncObserver, SyncState};

/// How long a cache miss may block on the remote fetch.
pub(crate) const READ_TIMEOUT: Duration = Duration::from_secs(30);
/// Deadline for one content push.
pub(crate) const WRITE_TIMEOUT: Duration = Duration::from_secs(30);
/// Deadline for directory-level commands.
pub(crate) const DIR_TIMEOUT: Duration = Duration::from_secs(10);
/// Poll step while another context fetches the same path.
const FETCH_POLL: Duration = Duration::from_millis(50);

/// Write-back cache over one remote project tree.
///
/// Reads are served from memory once a path is tracked; writes land in
/// memory and are pushed asynchronously. The cache lock is never held
/// across a network call, so slow transfers cannot stall foreground
/// reads and writes.
pub struct SyncEngine {
    session: SharedExec,
    remote_root: String,
    cache: Mutex<CacheInner>,
    observer: Option<Arc<dyn SyncObserver>>,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    /// Paths with unpushed changes, in sync order.
    pending: BTreeSet<String>,
    /// Paths another context is currently fetching from the remote.
    fetching: HashSet<String>,
}

impl SyncEngine {
    pub fn new(session: SharedExec, remote_root: &str) -> Self {
        Self {
            session,
            remote_root: remote_root.trim_end_matches('/').to_string(),
            cache: Mutex::new(CacheInner::default()),
            observer: None,
        }
    }

    /// Attach a state-transition observer, invoked on every transition
    /// outside the cache lock.
    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn remote_root(&self) -> &str {
        &self.remote_root
    }

    fn lock_cache(&self) -> MutexGuard<'_, CacheInner> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn exec(&self, command: &str, timeout: Duration) -> RemoteResult<CommandOutput> {
        let mut session = self
            .session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        session.execute(command, timeout)
    }

    fn notify(&self, path: &str, state: SyncState) {
        if let Some(observer) = &self.observer {
            observer.state_changed(path, state);
        }
    }

    pub(crate) fn remote_path(&self, path: &str) -> String {
        join_remote(&self.remote_root, path)
    }

    // ── Read / write ─────────────────────────────────────────────────────────

    /// Read a file: from cache when tracked (regardless of sync state),
    /// otherwise fetched synchronously from the remote host. Concurrent
    /// misses for the same path are collapsed into one fetch.
    pub fn read(&self, path: &str) -> RemoteResult<String> {
        validate_rel_path(path)?;

        loop {
            {
                let mut cache = self.lock_cache();
                if let Some(entry) = cache.entries.get(path) {
                    return Ok(entry.content.clone());
                }
                if !cache.fetching.contains(path) {
                    cache.fetching.insert(path.to_string());
                    break;
                }
            }
            // Another context is fetching this path; wait for it to land.
            thread::sleep(FETCH_POLL);
        }

        let fetched = self.fetch_remote(path);

        let mut cache = self.lock_cache();
        cache.fetching.remove(path);
        match fetched {
            Ok(content) => {
                cache
                    .entries
                    .insert(path.to_string(), CacheEntry::synced(content.clone()));
                Ok(content)
            }
            Err(e) => Err(e),
        }
    }

    fn fetch_remote(&self, path: &str) -> RemoteResult<String> {
        let remote = self.remote_path(path);
        debug!("fetching {}", remote);
        let out = self.exec(&commands::read_file_cmd(&remote), READ_TIMEOUT)?;
        if !out.success() {
            return Err(RemoteError::not_found(remote));
        }
        Ok(out.stdout)
    }

    /// Record new content in the cache and queue the path for sync.
    /// Never performs network I/O; always returns immediately.
    pub fn write(&self, path: &str, content: &str) -> RemoteResult<()> {
        validate_rel_path(path)?;
        {
            let mut cache = self.lock_cache();
            let entry = cache.entries.entry(path.to_string()).or_default();
            entry.content = content.to_string();
            entry.state = SyncState::Pending;
            cache.pending.insert(path.to_string());
        }
        self.notify(path, SyncState::Pending);
        Ok(())
    }

    // ── Synchronization ──────────────────────────────────────────────────────

    /// Push one path to the remote host. Trivially true when the path is
    /// untracked or already synced. Failures land in the error map; this
    /// never panics out of the background loop.
    pub fn sync_one(&self, path: &str) -> bool {
        let snapshot = {
            let mut cache = self.lock_cache();
            match cache.entries.get_mut(path) {
                None => return true,
                Some(entry) if entry.state == SyncState::Synced => return true,
                Some(entry) => {
                    entry.state = SyncState::Syncing;
                    entry.content.clone()
                }
            }
        };
        self.notify(path, SyncState::Syncing);

        match self.push_remote(path, &snapshot) {
            Ok(()) => {
                let new_state = {
                    let mut cache = self.lock_cache();
                    let CacheInner {
                        entries, pending, ..
                    } = &mut *cache;
                    match entries.get_mut(path) {
                        // Deleted while the transfer was in flight.
                        None => return true,
                        Some(entry) if entry.content == snapshot => {
                            entry.state = SyncState::Synced;
                            entry.error = None;
                            entry.retry_count = 0;
                            pending.remove(path);
                            SyncState::Synced
                        }
                        // A newer write landed mid-flight; what was just
                        // transferred is already stale.
                        Some(entry) => {
                            entry.state = SyncState::Pending;
                            pending.insert(path.to_string());
                            SyncState::Pending
                        }
                    }
                };
                self.notify(path, new_state);
                true
            }
            Err(e) => {
                warn!("sync failed for {}: {}", path, e);
                {
                    let mut cache = self.lock_cache();
                    let CacheInner {
                        entries, pending, ..
                    } = &mut *cache;
                    if let Some(entry) = entries.get_mut(path) {
                        entry.state = SyncState::Error;
                        entry.error = Some(e.to_string());
                        entry.retry_count += 1;
                    }
                    // Error paths wait for an explicit retry; the periodic
                    // pass only touches pending ones.
                    pending.remove(path);
                }
                self.notify(path, SyncState::Error);
                false
            }
        }
    }

    fn push_remote(&self, path: &str, content: &str) -> RemoteResult<()> {
        let remote = self.remote_path(path);
        if let Some(parent) = telesync_core::path::parent(&remote) {
            let out = self.exec(&commands::mkdir_cmd(parent), DIR_TIMEOUT)?;
            if !out.success() {
                return Err(RemoteError::command_failed(out.exit_code, out.stderr));
            }
        }
        let out = self.exec(&commands::write_file_cmd(&remote, content), WRITE_TIMEOUT)?;
        if !out.success() {
            return Err(RemoteError::command_failed(out.exit_code, out.stderr));
        }
        Ok(())
    }

    /// Push every pending path, in ascending path order. One path's
    /// failure does not stop the rest; returns whether all succeeded.
    pub fn sync_all(&self) -> bool {
        let pending: Vec<String> = self.lock_cache().pending.iter().cloned().collect();
        let mut all_ok = true;
        for path in pending {
            if !self.sync_one(&path) {
                all_ok = false;
            }
        }
        all_ok
    }

    /// Re-attempt every path currently in the error state.
    pub fn retry_errors(&self) -> bool {
        let mut failed: Vec<String> = {
            let cache = self.lock_cache();
            cache
                .entries
                .iter()
                .filter(|(_, entry)| entry.state == SyncState::Error)
                .map(|(path, _)| path.clone())
                .collect()
        };
        failed.sort();

        let mut all_ok = true;
        for path in failed {
            if !self.sync_one(&path) {
                all_ok = false;
            }
        }
        all_ok
    }

    // ── Status queries ───────────────────────────────────────────────────────

    /// Sync state for one path. Untracked paths count as synced.
    pub fn status(&self, path: &str) -> SyncState {
        self.lock_cache()
            .entries
            .get(path)
            .map(|entry| entry.state)
            .unwrap_or(SyncState::Synced)
    }

    /// Most severe state across all tracked paths.
    pub fn overall_status(&self) -> SyncState {
        let cache = self.lock_cache();
        cache
            .entries
            .values()
            .fold(SyncState::Synced, |acc, entry| acc.more_severe(entry.state))
    }

    pub fn pending_count(&self) -> usize {
        self.lock_cache().pending.len()
    }

    /// Paths currently in the error state, with their messages.
    pub fn errors(&self) -> BTreeMap<String, String> {
        let cache = self.lock_cache();
        cache
            .entries
            .iter()
            .filter(|(_, entry)| entry.state == SyncState::Error)
            .map(|(path, entry)| {
                (path.clone(), entry.error.clone().unwrap_or_default())
            })
            .collect()
    }

    /// Failed attempts recorded for a path since its last successful sync.
    pub fn retry_count(&self, path: &str) -> u32 {
        self.lock_cache()
            .entries
            .get(path)
            .map(|entry| entry.retry_count)
            .unwrap_or(0)
    }

    /// Drop a path from the cache and bookkeeping sets. Used by `delete`.
    pub(crate) fn evict(&self, path: &str) {
        let mut cache = self.lock_cache();
        cache.entries.remove(path);
        cache.pending.remove(path);
    }

    /// Whether the path is tracked in the cache.
    pub(crate) fn is_cached(&self, path: &str) -> bool {
        self.lock_cache().entries.contains_key(path)
    }
}
