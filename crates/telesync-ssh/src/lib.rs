//! # telesync – SSH
//!
//! Secure remote session over libssh2: blocking command execution with
//! per-call deadlines, streaming execution, SCP file transfer, and
//! second-hop sessions tunnelled through a login node.

pub mod ssh;

pub use ssh::{
    CommandOutput, CommandStream, ConnectOptions, RemoteExec, SharedExec, SshSession, StreamChunk,
};
