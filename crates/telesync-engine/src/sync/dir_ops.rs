// ── Directory operations – always served from the remote host ────────────────
//
// Directory membership changes independently of tracked file contents,
// so none of these are answered from the content cache (`exists` may
// short-circuit on a tracked path, which by definition exists). Failures
// are not queued or retried; they surface immediately.

use log::warn;
use telesync_core::path::validate_rel_path;
use telesync_core::{RemoteError, RemoteResult};

use super::commands;
use super::service::{SyncEngine, DIR_TIMEOUT, READ_TIMEOUT};

impl SyncEngine {
    /// List a remote directory. Failures surface as an empty listing.
    pub fn list_dir(&self, path: &str) -> Vec<String> {
        if validate_rel_path(path).is_err() {
            return Vec::new();
        }
        let remote = self.remote_path(path);
        match self.exec(&commands::list_dir_cmd(&remote), DIR_TIMEOUT) {
            Ok(out) if out.success() => parse_lines(&out.stdout),
            Ok(_) => Vec::new(),
            Err(e) => {
                warn!("list_dir {} failed: {}", remote, e);
                Vec::new()
            }
        }
    }

    /// Whether a path exists remotely. Tracked paths short-circuit: a
    /// cached entry exists by definition, even before its first sync.
    pub fn exists(&self, path: &str) -> bool {
        if validate_rel_path(path).is_err() {
            return false;
        }
        if self.is_cached(path) {
            return true;
        }
        let remote = self.remote_path(path);
        self.exec(&commands::exists_cmd(&remote), DIR_TIMEOUT)
            .map(|out| out.success())
            .unwrap_or(false)
    }

    /// Glob for files under the project root. Supports `**`. Matches are
    /// returned relative to the root; failures surface as no matches.
    pub fn glob(&self, pattern: &str) -> Vec<String> {
        if validate_rel_path(pattern).is_err() {
            return Vec::new();
        }
        match self.exec(&commands::glob_cmd(self.remote_root(), pattern), READ_TIMEOUT) {
            Ok(out) if out.success() => parse_lines(&out.stdout),
            Ok(_) => Vec::new(),
            Err(e) => {
                warn!("glob '{}' failed: {}", pattern, e);
                Vec::new()
            }
        }
    }

    /// Create a remote directory, parents included.
    pub fn mkdir(&self, path: &str) -> RemoteResult<()> {
        validate_rel_path(path)?;
        let remote = self.remote_path(path);
        let out = self.exec(&commands::mkdir_cmd(&remote), DIR_TIMEOUT)?;
        if !out.success() {
            return Err(RemoteError::command_failed(out.exit_code, out.stderr));
        }
        Ok(())
    }

    /// Delete a remote file or empty directory, and drop the path from
    /// the cache and every bookkeeping set.
    pub fn delete(&self, path: &str) -> RemoteResult<()> {
        validate_rel_path(path)?;
        let remote = self.remote_path(path);
        let out = self.exec(&commands::delete_cmd(&remote), DIR_TIMEOUT)?;
        if !out.success() {
            return Err(RemoteError::command_failed(out.exit_code, out.stderr));
        }
        self.evict(path);
        Ok(())
    }

    /// Eagerly populate the cache with every file matching `patterns`.
    /// Called when a project is opened; individual failures are logged
    /// and skipped so one bad file never aborts the load.
    pub fn load_project(&self, patterns: &[&str]) {
        for pattern in patterns {
            for path in self.glob(pattern) {
                if let Err(e) = self.read(&path) {
                    warn!("failed to load {}: {}", path, e);
                }
            }
        }
    }
}

fn parse_lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}
