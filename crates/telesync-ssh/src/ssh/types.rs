// ── Types ─────────────────────────────────────────────────────────────────────

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use telesync_core::RemoteResult;

// ── Serde default helpers ────────────────────────────────────────────────────

fn default_connect_timeout_secs() -> u64 {
    30
}
fn default_keepalive_secs() -> u64 {
    60
}
fn default_true() -> bool {
    true
}

// ── Connection options ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectOptions {
    /// Handshake deadline in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub compression: bool,
    #[serde(default = "default_true")]
    pub tcp_no_delay: bool,
    /// 0 disables keep-alive probes.
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_interval_secs: u64,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            compression: false,
            tcp_no_delay: true,
            keepalive_interval_secs: default_keepalive_secs(),
        }
    }
}

impl ConnectOptions {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

// ── Command results ──────────────────────────────────────────────────────────

/// Result of a completed remote command. A non-zero exit code is data, not
/// an error — callers decide what failure means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// One element of a streaming execution. The stream always ends with
/// exactly one `Exit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    Stdout(String),
    Stderr(String),
    Exit(i32),
}

// ── Execution seam ───────────────────────────────────────────────────────────

/// Minimal command-execution interface the sync engine builds on.
///
/// `SshSession` is the production implementation; tests substitute a
/// scripted in-memory remote.
pub trait RemoteExec: Send {
    fn execute(&mut self, command: &str, timeout: Duration) -> RemoteResult<CommandOutput>;
}

/// Shared session handle. Callers must never hold any other lock while
/// taking this one across a network call.
pub type SharedExec = Arc<Mutex<dyn RemoteExec>>;
