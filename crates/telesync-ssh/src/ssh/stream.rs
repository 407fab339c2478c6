// ── Streaming command execution ──────────────────────────────────────────────

use std::io::Read;

use ssh2::Channel;
use telesync_core::RemoteResult;

use super::types::StreamChunk;
use super::{map_io_err, map_ssh_err};

const STREAM_BUF: usize = 8192;

/// Lazy, single-pass output stream of one remote command.
///
/// Stdout chunks are yielded as they arrive, stderr is drained once stdout
/// reaches EOF, and the exit code is delivered as the terminal element.
/// The stream is not restartable; dropping it abandons the command.
pub struct CommandStream {
    channel: Channel,
    state: State,
}

enum State {
    Stdout,
    Stderr,
    Exit,
    Done,
}

impl CommandStream {
    pub(crate) fn new(channel: Channel) -> Self {
        Self {
            channel,
            state: State::Stdout,
        }
    }
}

impl Iterator for CommandStream {
    type Item = RemoteResult<StreamChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut buf = [0u8; STREAM_BUF];
        loop {
            match self.state {
                State::Stdout => match self.channel.read(&mut buf) {
                    Ok(0) => self.state = State::Stderr,
                    Ok(n) => {
                        return Some(Ok(StreamChunk::Stdout(
                            String::from_utf8_lossy(&buf[..n]).into_owned(),
                        )))
                    }
                    Err(e) => {
                        self.state = State::Done;
                        return Some(Err(map_io_err("reading stream", e)));
                    }
                },
                State::Stderr => match self.channel.stderr().read(&mut buf) {
                    Ok(0) => self.state = State::Exit,
                    Ok(n) => {
                        return Some(Ok(StreamChunk::Stderr(
                            String::from_utf8_lossy(&buf[..n]).into_owned(),
                        )))
                    }
                    Err(e) => {
                        self.state = State::Done;
                        return Some(Err(map_io_err("reading stream", e)));
                    }
                },
                State::Exit => {
                    self.state = State::Done;
                    self.channel.wait_close().ok();
                    return Some(
                        self.channel
                            .exit_status()
                            .map(StreamChunk::Exit)
                            .map_err(|e| map_ssh_err("reading exit status", e)),
                    );
                }
                State::Done => return None,
            }
        }
    }
}
