//! Remote endpoint specifiers and authentication material.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RemoteError, RemoteResult};

pub const DEFAULT_SSH_PORT: u16 = 22;

/// A parsed `[user@]host[:port]` specifier. Username is mandatory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEndpoint {
    pub username: String,
    pub host: String,
    pub port: u16,
}

impl RemoteEndpoint {
    /// Parse a host specifier of the form `user@host[:port]`.
    ///
    /// Fails with `ConnectionFailed` when the username is absent or the
    /// port is not a number, so that a malformed specifier surfaces the
    /// same way as any other connect-time failure.
    pub fn parse(spec: &str) -> RemoteResult<Self> {
        let (username, rest) = spec
            .split_once('@')
            .ok_or_else(|| RemoteError::connection("username is required (format: user@host)"))?;

        if username.is_empty() {
            return Err(RemoteError::connection(
                "username is required (format: user@host)",
            ));
        }

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port_str)) => {
                let port = port_str.parse::<u16>().map_err(|_| {
                    RemoteError::connection(format!("invalid port '{}' in '{}'", port_str, spec))
                })?;
                (host, port)
            }
            None => (rest, DEFAULT_SSH_PORT),
        };

        if host.is_empty() {
            return Err(RemoteError::connection(format!("missing host in '{}'", spec)));
        }

        Ok(Self {
            username: username.to_string(),
            host: host.to_string(),
            port,
        })
    }

    /// `host:port`, suitable for a TCP connect.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for RemoteEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.username, self.host, self.port)
    }
}

impl FromStr for RemoteEndpoint {
    type Err = RemoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Authentication material for one connection attempt.
///
/// Supplied by the credential provider and consumed by the session; never
/// persisted here. Encryption-at-rest of secrets is the provider's problem.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    Password(String),
    KeyFile {
        path: PathBuf,
        passphrase: Option<String>,
    },
    Agent,
}
