// ── Background sync worker ───────────────────────────────────────────────────

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, warn};
use telesync_core::{RemoteError, RemoteResult};

use super::service::SyncEngine;

pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Periodic background pass over the pending set.
///
/// The stop signal is observed once per tick, at the iteration boundary.
/// `stop` waits for an in-flight pass to finish, bounded by a timeout, so
/// a hung network call cannot block shutdown forever.
pub struct SyncWorker {
    stop_tx: mpsc::Sender<()>,
    done_rx: mpsc::Receiver<()>,
    thread: Option<JoinHandle<()>>,
}

impl SyncWorker {
    /// Spawn the worker thread. It runs `sync_all` every `interval` until
    /// stopped.
    pub fn start(engine: Arc<SyncEngine>, interval: Duration) -> RemoteResult<Self> {
        let (stop_tx, stop_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();

        let thread = thread::Builder::new()
            .name("telesync-sync".into())
            .spawn(move || {
                debug!("sync worker started ({}ms interval)", interval.as_millis());
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            engine.sync_all();
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("sync worker stopped");
                let _ = done_tx.send(());
            })
            .map_err(|e| RemoteError::io(format!("spawning sync worker: {}", e)))?;

        Ok(Self {
            stop_tx,
            done_rx,
            thread: Some(thread),
        })
    }

    /// Signal the worker and wait up to `join_timeout` for it to finish.
    /// Returns whether the thread was actually joined; on timeout it is
    /// left detached and exits after the in-flight pass completes.
    pub fn stop(mut self, join_timeout: Duration) -> bool {
        let _ = self.stop_tx.send(());
        match self.done_rx.recv_timeout(join_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(thread) = self.thread.take() {
                    let _ = thread.join();
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("sync worker still busy after {:?}; detaching", join_timeout);
                self.thread.take();
                false
            }
        }
    }
}

impl Drop for SyncWorker {
    fn drop(&mut self) {
        // A dropped handle still signals the thread; it exits at the next
        // tick boundary without being joined.
        let _ = self.stop_tx.send(());
        self.thread.take();
    }
}
