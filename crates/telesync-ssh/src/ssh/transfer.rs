// ── File transfer – SCP upload & download over the active hop ────────────────

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use log::info;
use telesync_core::{path as project_path, RemoteError, RemoteResult};
use walkdir::WalkDir;

use super::session::SshSession;
use super::{map_io_err, map_ssh_err, quote, LIBSSH2_ERROR_SCP_PROTOCOL};

const TRANSFER_CHUNK: usize = 32 * 1024;
const FILE_MODE: i32 = 0o644;

impl SshSession {
    // ── Upload ───────────────────────────────────────────────────────────────

    /// Upload one local file over SCP. Missing remote parent directories
    /// are created first. `timeout` bounds each blocking I/O step rather
    /// than the whole transfer, so large files are not penalised.
    pub fn upload_file(
        &mut self,
        local: &Path,
        remote: &str,
        timeout: Duration,
    ) -> RemoteResult<u64> {
        if let Some(parent) = project_path::parent(remote) {
            self.ensure_remote_dir(parent, timeout)?;
        }
        self.upload_one(local, remote, timeout)
    }

    fn upload_one(&mut self, local: &Path, remote: &str, timeout: Duration) -> RemoteResult<u64> {
        let metadata = fs::metadata(local)
            .map_err(|e| RemoteError::io(format!("reading '{}': {}", local.display(), e)))?;
        if !metadata.is_file() {
            return Err(RemoteError::io(format!(
                "'{}' is not a regular file",
                local.display()
            )));
        }
        let total = metadata.len();

        self.touch();
        let session = self.active_session();
        session.set_timeout(timeout.as_millis() as u32);

        let result = (|| -> RemoteResult<u64> {
            let mut channel = session
                .scp_send(Path::new(remote), FILE_MODE, total, None)
                .map_err(|e| map_ssh_err("SCP send init", e))?;

            let mut file = File::open(local)
                .map_err(|e| RemoteError::io(format!("opening '{}': {}", local.display(), e)))?;

            let mut buf = vec![0u8; TRANSFER_CHUNK];
            let mut sent: u64 = 0;
            loop {
                let n = file
                    .read(&mut buf)
                    .map_err(|e| RemoteError::io(format!("reading '{}': {}", local.display(), e)))?;
                if n == 0 {
                    break;
                }
                channel
                    .write_all(&buf[..n])
                    .map_err(|e| map_io_err("SCP write", e))?;
                sent += n as u64;
            }

            channel.send_eof().map_err(|e| map_ssh_err("SCP EOF", e))?;
            channel.wait_eof().map_err(|e| map_ssh_err("SCP EOF", e))?;
            channel.close().map_err(|e| map_ssh_err("closing channel", e))?;
            channel.wait_close().ok();
            Ok(sent)
        })();

        session.set_timeout(0);
        if let Ok(sent) = &result {
            info!("uploaded {} bytes to {}", sent, remote);
        }
        result
    }

    // ── Download ─────────────────────────────────────────────────────────────

    /// Download one remote file over SCP, creating missing local parent
    /// directories. A missing remote path surfaces as `NotFound`.
    pub fn download_file(
        &mut self,
        remote: &str,
        local: &Path,
        timeout: Duration,
    ) -> RemoteResult<u64> {
        if let Some(parent) = local.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    RemoteError::io(format!("creating '{}': {}", parent.display(), e))
                })?;
            }
        }

        self.touch();
        let session = self.active_session();
        session.set_timeout(timeout.as_millis() as u32);

        let result = (|| -> RemoteResult<u64> {
            let (mut channel, stat) = session.scp_recv(Path::new(remote)).map_err(|e| {
                if matches!(e.code(), ssh2::ErrorCode::Session(LIBSSH2_ERROR_SCP_PROTOCOL)) {
                    RemoteError::not_found(remote)
                } else {
                    map_ssh_err("SCP recv init", e)
                }
            })?;

            let total = stat.size();
            let mut file = File::create(local)
                .map_err(|e| RemoteError::io(format!("creating '{}': {}", local.display(), e)))?;

            let mut buf = vec![0u8; TRANSFER_CHUNK];
            let mut remaining = total;
            while remaining > 0 {
                let want = remaining.min(TRANSFER_CHUNK as u64) as usize;
                let n = channel
                    .read(&mut buf[..want])
                    .map_err(|e| map_io_err("SCP read", e))?;
                if n == 0 {
                    break;
                }
                file.write_all(&buf[..n])
                    .map_err(|e| RemoteError::io(format!("writing '{}': {}", local.display(), e)))?;
                remaining -= n as u64;
            }

            channel.send_eof().ok();
            channel.wait_eof().ok();
            channel.close().ok();
            channel.wait_close().ok();
            Ok(total - remaining)
        })();

        session.set_timeout(0);
        if let Ok(received) = &result {
            info!("downloaded {} bytes from {}", received, remote);
        }
        result
    }

    // ── Recursive upload ─────────────────────────────────────────────────────

    /// Recursively upload a directory tree. Remote directories are created
    /// before the files inside them. Returns the number of files uploaded.
    pub fn upload_directory(
        &mut self,
        local_dir: &Path,
        remote_dir: &str,
        timeout: Duration,
    ) -> RemoteResult<usize> {
        if !local_dir.is_dir() {
            return Err(RemoteError::not_found(local_dir.display().to_string()));
        }

        let remote_dir = remote_dir.trim_end_matches('/');
        self.ensure_remote_dir(remote_dir, timeout)?;

        let mut uploaded = 0usize;
        for entry in WalkDir::new(local_dir).min_depth(1).sort_by_file_name() {
            let entry = entry
                .map_err(|e| RemoteError::io(format!("walking '{}': {}", local_dir.display(), e)))?;
            let rel = entry
                .path()
                .strip_prefix(local_dir)
                .map_err(|e| RemoteError::io(e.to_string()))?;
            let rel_slash = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let remote_path = format!("{}/{}", remote_dir, rel_slash);

            if entry.file_type().is_dir() {
                self.ensure_remote_dir(&remote_path, timeout)?;
            } else if entry.file_type().is_file() {
                self.upload_one(entry.path(), &remote_path, timeout)?;
                uploaded += 1;
            }
        }

        info!(
            "uploaded {} files from '{}' to {}",
            uploaded,
            local_dir.display(),
            remote_dir
        );
        Ok(uploaded)
    }

    // ── Helpers ──────────────────────────────────────────────────────────────

    fn ensure_remote_dir(&mut self, dir: &str, timeout: Duration) -> RemoteResult<()> {
        if dir.is_empty() || dir == "/" {
            return Ok(());
        }
        let out = self.execute(&format!("mkdir -p {}", quote(dir)), timeout)?;
        if !out.success() {
            return Err(RemoteError::command_failed(out.exit_code, out.stderr));
        }
        Ok(())
    }
}
