// ── Loopback relay for tunnelled second-hop sessions ─────────────────────────
//
// libssh2 wants a socket for a new session, but a second hop only has a
// direct-tcpip channel multiplexed over the primary transport. The relay
// bridges the two: a loopback socket pair whose server end is pumped
// to/from the channel by a dedicated thread, and whose client end is
// handed to the hop session as its "network" stream.

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::debug;
use ssh2::Channel;
use telesync_core::{RemoteError, RemoteResult};

const BUF_SIZE: usize = 16384;
const MIN_SLEEP_MS: u64 = 1;
const MAX_SLEEP_MS: u64 = 10;
const IDLE_THRESHOLD: u32 = 10;

pub(crate) struct ChannelRelay {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ChannelRelay {
    /// Bridge `channel` to a fresh loopback socket pair. Returns the relay
    /// handle and the client end of the pair. The channel's session must
    /// already be in non-blocking mode.
    pub fn spawn(channel: Channel) -> RemoteResult<(Self, TcpStream)> {
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .map_err(|e| RemoteError::io(format!("binding relay listener: {}", e)))?;
        let addr = listener
            .local_addr()
            .map_err(|e| RemoteError::io(format!("reading relay address: {}", e)))?;

        let client = TcpStream::connect(addr)
            .map_err(|e| RemoteError::io(format!("connecting relay pair: {}", e)))?;
        let (server, _) = listener
            .accept()
            .map_err(|e| RemoteError::io(format!("accepting relay pair: {}", e)))?;

        server
            .set_nonblocking(true)
            .map_err(|e| RemoteError::io(format!("configuring relay socket: {}", e)))?;
        server.set_nodelay(true).ok();
        client.set_nodelay(true).ok();

        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let thread = thread::Builder::new()
            .name("telesync-relay".into())
            .spawn(move || pump(channel, server, flag))
            .map_err(|e| RemoteError::io(format!("spawning relay thread: {}", e)))?;

        Ok((
            Self {
                running,
                thread: Some(thread),
            },
            client,
        ))
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for ChannelRelay {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ── Pump thread ──────────────────────────────────────────────────────────────

fn pump(mut channel: Channel, mut socket: TcpStream, running: Arc<AtomicBool>) {
    let mut buf = [0u8; BUF_SIZE];
    let mut idle: u32 = 0;

    while running.load(Ordering::Relaxed) {
        let mut progressed = false;

        // channel → socket
        match channel.read(&mut buf) {
            Ok(0) => {
                if channel.eof() {
                    debug!("relay: channel EOF");
                    break;
                }
            }
            Ok(n) => {
                if socket_write_all(&mut socket, &buf[..n]).is_err() {
                    break;
                }
                progressed = true;
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => {
                debug!("relay: channel read ended: {}", e);
                break;
            }
        }

        // socket → channel
        match socket.read(&mut buf) {
            Ok(0) => {
                debug!("relay: socket closed");
                break;
            }
            Ok(n) => {
                if channel_write_all(&mut channel, &buf[..n], &running).is_err() {
                    break;
                }
                progressed = true;
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => {
                debug!("relay: socket read ended: {}", e);
                break;
            }
        }

        if progressed {
            idle = 0;
        } else {
            idle = idle.saturating_add(1);
            let sleep_ms = if idle > IDLE_THRESHOLD {
                MAX_SLEEP_MS
            } else {
                MIN_SLEEP_MS
            };
            thread::sleep(Duration::from_millis(sleep_ms));
        }
    }

    channel.close().ok();
}

fn socket_write_all(socket: &mut TcpStream, mut data: &[u8]) -> io::Result<()> {
    while !data.is_empty() {
        match socket.write(data) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => data = &data[n..],
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(MIN_SLEEP_MS));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn channel_write_all(
    channel: &mut Channel,
    mut data: &[u8],
    running: &AtomicBool,
) -> io::Result<()> {
    while !data.is_empty() {
        if !running.load(Ordering::Relaxed) {
            return Err(io::ErrorKind::Interrupted.into());
        }
        match channel.write(data) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => data = &data[n..],
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(MIN_SLEEP_MS));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
