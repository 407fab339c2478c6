// ── telesync-ssh / ssh module ────────────────────────────────────────────────
//
// Secure remote session over libssh2:
//   • Blocking command execution with per-call deadlines
//   • Streaming execution for long-running remote tasks
//   • SCP file and recursive directory transfer
//   • Second-hop sessions tunnelled through the primary transport

pub mod session;
pub mod stream;
pub mod transfer;
pub mod types;

mod tunnel;

pub use session::SshSession;
pub use stream::CommandStream;
pub use types::*;

use std::borrow::Cow;
use std::io;

use telesync_core::RemoteError;

// libssh2 error codes we need to tell apart.
pub(crate) const LIBSSH2_ERROR_TIMEOUT: i32 = -9;
pub(crate) const LIBSSH2_ERROR_SCP_PROTOCOL: i32 = -28;

/// Quote one shell argument for a remote command line.
pub(crate) fn quote(s: &str) -> String {
    shell_escape::escape(Cow::from(s)).into_owned()
}

pub(crate) fn map_ssh_err(context: &str, e: ssh2::Error) -> RemoteError {
    match e.code() {
        ssh2::ErrorCode::Session(LIBSSH2_ERROR_TIMEOUT) => {
            RemoteError::timed_out(format!("{}: {}", context, e))
        }
        _ => RemoteError::connection(format!("{}: {}", context, e)),
    }
}

/// Errors from `Read`/`Write` on channels count as transport loss unless
/// the deadline expired.
pub(crate) fn map_io_err(context: &str, e: io::Error) -> RemoteError {
    match e.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
            RemoteError::timed_out(format!("{}: {}", context, e))
        }
        _ => RemoteError::connection(format!("{}: {}", context, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_plain_path() {
        assert_eq!(quote("/data/projects/demo"), "/data/projects/demo");
    }

    #[test]
    fn quote_path_with_spaces_and_quotes() {
        assert_eq!(quote("my file"), "'my file'");
        assert_eq!(quote("it's"), "'it'\\''s'");
    }
}
