// ── SshSession – connection lifecycle and command execution ──────────────────

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info};
use ssh2::Session;
use telesync_core::{AuthMethod, RemoteEndpoint, RemoteError, RemoteResult};
use uuid::Uuid;

use super::stream::CommandStream;
use super::tunnel::ChannelRelay;
use super::types::{CommandOutput, ConnectOptions, RemoteExec};
use super::{map_io_err, map_ssh_err};

/// One authenticated connection to a host, with an optional second hop
/// tunnelled through it. While a hop is established, every command and
/// file operation routes through the hop.
pub struct SshSession {
    id: String,
    endpoint: RemoteEndpoint,
    opts: ConnectOptions,
    primary: Session,
    hop: Option<SecondHop>,
    connected_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

struct SecondHop {
    endpoint: RemoteEndpoint,
    session: Session,
    relay: ChannelRelay,
}

impl SshSession {
    // ── Connect ──────────────────────────────────────────────────────────────

    /// Connect and authenticate to `target` (`user@host[:port]`).
    pub fn connect(target: &str, auth: &AuthMethod, opts: &ConnectOptions) -> RemoteResult<Self> {
        let endpoint = RemoteEndpoint::parse(target)?;
        info!("connecting to {}", endpoint);

        let tcp = tcp_connect(&endpoint, opts)?;
        let session = handshake_over(tcp, &endpoint, auth, opts)?;

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            endpoint,
            opts: opts.clone(),
            primary: session,
            hop: None,
            connected_at: now,
            last_activity: now,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn endpoint(&self) -> &RemoteEndpoint {
        &self.endpoint
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// Host the session currently talks to (the hop when one is active).
    pub fn active_endpoint(&self) -> &RemoteEndpoint {
        self.hop
            .as_ref()
            .map(|h| &h.endpoint)
            .unwrap_or(&self.endpoint)
    }

    pub(crate) fn active_session(&self) -> &Session {
        self.hop
            .as_ref()
            .map(|h| &h.session)
            .unwrap_or(&self.primary)
    }

    pub(crate) fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    // ── Second hop ───────────────────────────────────────────────────────────

    /// Open a session to `node`, multiplexed through the already-established
    /// transport of this one. Used when the primary host is a login node and
    /// execution must happen on a compute node not reachable directly.
    pub fn open_second_hop(&mut self, node: &str, auth: &AuthMethod) -> RemoteResult<()> {
        let endpoint = RemoteEndpoint::parse(node)?;
        self.clear_second_hop();

        let channel = self
            .primary
            .channel_direct_tcpip(&endpoint.host, endpoint.port, None)
            .map_err(|e| map_ssh_err(&format!("opening tunnel to {}", endpoint.addr()), e))?;

        // The relay thread pumps the tunnel channel, which needs the primary
        // transport in non-blocking mode. Every subsequent operation routes
        // through the hop, so the primary is dedicated to relaying.
        self.primary.set_blocking(false);

        let (relay, stream) = match ChannelRelay::spawn(channel) {
            Ok(pair) => pair,
            Err(e) => {
                self.primary.set_blocking(true);
                return Err(e);
            }
        };

        match handshake_over(stream, &endpoint, auth, &self.opts) {
            Ok(session) => {
                info!("second hop established: {} via {}", endpoint, self.endpoint);
                self.hop = Some(SecondHop {
                    endpoint,
                    session,
                    relay,
                });
                Ok(())
            }
            Err(e) => {
                relay.stop();
                self.primary.set_blocking(true);
                Err(e)
            }
        }
    }

    pub fn has_second_hop(&self) -> bool {
        self.hop.is_some()
    }

    /// Tear down the second hop, if any, and route operations back through
    /// the primary host.
    pub fn clear_second_hop(&mut self) {
        if let Some(hop) = self.hop.take() {
            debug!("closing second hop to {}", hop.endpoint);
            hop.session.disconnect(None, "closing", None).ok();
            hop.relay.stop();
            self.primary.set_blocking(true);
        }
    }

    // ── Command execution ────────────────────────────────────────────────────

    /// Run a command to completion. `timeout` bounds every blocking step;
    /// expiry surfaces as `TimedOut`. Non-zero exit is reported through
    /// `CommandOutput::exit_code`, not as an error.
    pub fn execute(&mut self, command: &str, timeout: Duration) -> RemoteResult<CommandOutput> {
        self.last_activity = Utc::now();
        let session = self.active_session();
        session.set_timeout(timeout.as_millis() as u32);
        let result = run_command(session, command);
        session.set_timeout(0);
        result
    }

    /// Start a command and return a lazy, single-pass stream of its output.
    /// Chunks are yielded as they arrive; the exit code is the terminal
    /// element. Dropping the stream abandons the command.
    pub fn execute_streaming(&mut self, command: &str) -> RemoteResult<CommandStream> {
        self.last_activity = Utc::now();
        let session = self.active_session();
        session.set_timeout(0);
        let mut channel = session
            .channel_session()
            .map_err(|e| map_ssh_err("opening channel", e))?;
        channel
            .exec(command)
            .map_err(|e| map_ssh_err("starting command", e))?;
        Ok(CommandStream::new(channel))
    }

    /// Cheap liveness probe.
    pub fn is_connected(&mut self) -> bool {
        self.execute("echo ok", Duration::from_secs(5))
            .map(|out| out.success() && out.stdout.trim() == "ok")
            .unwrap_or(false)
    }

    /// Close the hop (if any) and the primary transport.
    pub fn disconnect(&mut self) {
        self.clear_second_hop();
        self.primary.disconnect(None, "closing", None).ok();
        info!("disconnected from {}", self.endpoint);
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        self.clear_second_hop();
    }
}

impl RemoteExec for SshSession {
    fn execute(&mut self, command: &str, timeout: Duration) -> RemoteResult<CommandOutput> {
        SshSession::execute(self, command, timeout)
    }
}

// ── Connection plumbing ──────────────────────────────────────────────────────

fn tcp_connect(endpoint: &RemoteEndpoint, opts: &ConnectOptions) -> RemoteResult<TcpStream> {
    let addrs = (endpoint.host.as_str(), endpoint.port)
        .to_socket_addrs()
        .map_err(|e| RemoteError::connection(format!("resolving {}: {}", endpoint.addr(), e)))?;

    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, opts.connect_timeout()) {
            Ok(stream) => {
                if opts.tcp_no_delay {
                    stream.set_nodelay(true).ok();
                }
                return Ok(stream);
            }
            Err(e) => last_err = Some(e),
        }
    }

    Err(RemoteError::connection(match last_err {
        Some(e) => format!("connecting to {}: {}", endpoint.addr(), e),
        None => format!("{} resolved to no addresses", endpoint.addr()),
    }))
}

/// Handshake and authenticate an ssh2 session over an established stream.
/// Used for the direct connection and for the relayed second hop alike.
fn handshake_over(
    stream: TcpStream,
    endpoint: &RemoteEndpoint,
    auth: &AuthMethod,
    opts: &ConnectOptions,
) -> RemoteResult<Session> {
    let mut session = Session::new()
        .map_err(|e| RemoteError::connection(format!("creating session: {}", e)))?;

    if opts.compression {
        session.set_compress(true);
    }
    session.set_tcp_stream(stream);
    session.set_timeout((opts.connect_timeout_secs * 1000) as u32);
    session
        .handshake()
        .map_err(|e| map_ssh_err(&format!("handshake with {}", endpoint.addr()), e))?;

    authenticate(&session, &endpoint.username, auth)?;
    if !session.authenticated() {
        return Err(RemoteError::connection(format!(
            "authentication failed for {}",
            endpoint
        )));
    }

    if opts.keepalive_interval_secs > 0 {
        session.set_keepalive(true, opts.keepalive_interval_secs as u32);
    }
    session.set_timeout(0);
    Ok(session)
}

fn authenticate(session: &Session, username: &str, auth: &AuthMethod) -> RemoteResult<()> {
    let result = match auth {
        AuthMethod::KeyFile { path, passphrase } => {
            session.userauth_pubkey_file(username, None, path, passphrase.as_deref())
        }
        AuthMethod::Password(password) => session.userauth_password(username, password),
        AuthMethod::Agent => session.userauth_agent(username),
    };
    result.map_err(|e| {
        RemoteError::connection(format!("authentication failed for {}: {}", username, e))
    })
}

fn run_command(session: &Session, command: &str) -> RemoteResult<CommandOutput> {
    use std::io::Read;

    let mut channel = session
        .channel_session()
        .map_err(|e| map_ssh_err("opening channel", e))?;
    channel
        .exec(command)
        .map_err(|e| map_ssh_err("executing command", e))?;

    let mut stdout = Vec::new();
    channel
        .read_to_end(&mut stdout)
        .map_err(|e| map_io_err("reading stdout", e))?;

    let mut stderr = Vec::new();
    channel
        .stderr()
        .read_to_end(&mut stderr)
        .map_err(|e| map_io_err("reading stderr", e))?;

    channel.wait_close().ok();
    let exit_code = channel
        .exit_status()
        .map_err(|e| map_ssh_err("reading exit status", e))?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        exit_code,
    })
}
