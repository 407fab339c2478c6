//! Unified error type for session, sync and storage operations.

use std::fmt;
use std::io;

/// Categorised failure shared by every telesync crate.
///
/// Callers match on the variant to pick a recovery strategy (reconnect,
/// retry, surface to the operator) instead of parsing message strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Authentication or transport failure. Fatal to the current session;
    /// requires an explicit reconnect.
    ConnectionFailed(String),
    /// An operation exceeded its deadline. Transient and retryable.
    TimedOut(String),
    /// A remote command completed but signalled failure via exit status.
    CommandFailed { exit_code: i32, stderr: String },
    /// A referenced path does not exist.
    NotFound(String),
    /// A project-relative path was absolute, escaped the root, or used
    /// the wrong separator.
    InvalidPath(String),
    /// Local I/O error (filesystem, relay sockets).
    Io(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

// ── Construction helpers ─────────────────────────────────────────────

impl RemoteError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionFailed(msg.into())
    }

    pub fn timed_out(msg: impl Into<String>) -> Self {
        Self::TimedOut(msg.into())
    }

    pub fn command_failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self::CommandFailed {
            exit_code,
            stderr: stderr.into(),
        }
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn invalid_path(msg: impl Into<String>) -> Self {
        Self::InvalidPath(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Whether a retry without operator intervention could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TimedOut(_) | Self::CommandFailed { .. } | Self::ConnectionFailed(_)
        )
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed(msg) => write!(f, "connection failed: {}", msg),
            Self::TimedOut(msg) => write!(f, "timed out: {}", msg),
            Self::CommandFailed { exit_code, stderr } => {
                write!(f, "remote command failed (exit {}): {}", exit_code, stderr.trim())
            }
            Self::NotFound(path) => write!(f, "not found: {}", path),
            Self::InvalidPath(msg) => write!(f, "invalid path: {}", msg),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for RemoteError {}

impl From<io::Error> for RemoteError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => Self::NotFound(e.to_string()),
            io::ErrorKind::TimedOut => Self::TimedOut(e.to_string()),
            _ => Self::Io(e.to_string()),
        }
    }
}

impl From<RemoteError> for String {
    fn from(e: RemoteError) -> String {
        e.to_string()
    }
}
