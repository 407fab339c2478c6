// ── RemoteStorage – synchronized remote backing ──────────────────────────────

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::info;
use telesync_core::RemoteResult;
use telesync_engine::{SyncEngine, SyncWorker};

use super::ProjectStorage;

/// Delegates every operation to a [`SyncEngine`], and owns the lifecycle
/// of its background worker: started on project open, stopped with a
/// bounded join on project close.
pub struct RemoteStorage {
    engine: Arc<SyncEngine>,
    worker: Mutex<Option<SyncWorker>>,
}

impl RemoteStorage {
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self {
            engine,
            worker: Mutex::new(None),
        }
    }

    /// Engine handle for status surfaces (per-path state, pending count,
    /// error map, explicit sync/retry).
    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    /// Eagerly pull files matching `patterns` into the cache.
    pub fn load_project(&self, patterns: &[&str]) {
        self.engine.load_project(patterns);
    }

    /// Start the background worker. A second call while one is running is
    /// a no-op.
    pub fn start_sync(&self, interval: Duration) -> RemoteResult<()> {
        let mut worker = self.worker.lock().unwrap_or_else(|p| p.into_inner());
        if worker.is_some() {
            return Ok(());
        }
        *worker = Some(SyncWorker::start(self.engine.clone(), interval)?);
        info!("background sync started ({:?} interval)", interval);
        Ok(())
    }

    /// Stop the background worker, waiting up to `join_timeout` for an
    /// in-flight pass. Returns whether the worker thread was joined;
    /// true when no worker was running.
    pub fn stop_sync(&self, join_timeout: Duration) -> bool {
        let handle = {
            let mut worker = self.worker.lock().unwrap_or_else(|p| p.into_inner());
            worker.take()
        };
        match handle {
            Some(worker) => worker.stop(join_timeout),
            None => true,
        }
    }
}

impl ProjectStorage for RemoteStorage {
    fn read_file(&self, path: &str) -> RemoteResult<String> {
        self.engine.read(path)
    }

    fn write_file(&self, path: &str, content: &str) -> RemoteResult<()> {
        self.engine.write(path, content)
    }

    fn list_dir(&self, path: &str) -> RemoteResult<Vec<String>> {
        Ok(self.engine.list_dir(path))
    }

    fn exists(&self, path: &str) -> bool {
        self.engine.exists(path)
    }

    fn glob(&self, pattern: &str) -> RemoteResult<Vec<String>> {
        Ok(self.engine.glob(pattern))
    }

    fn mkdir(&self, path: &str) -> RemoteResult<()> {
        self.engine.mkdir(path)
    }

    fn delete(&self, path: &str) -> RemoteResult<()> {
        self.engine.delete(path)
    }
}

impl Drop for RemoteStorage {
    fn drop(&mut self) {
        self.stop_sync(telesync_engine::DEFAULT_JOIN_TIMEOUT);
    }
}
