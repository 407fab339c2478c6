// ── telesync-engine / sync module ────────────────────────────────────────────
//
// Write-back synchronization of a remote project tree:
//   • Per-path cache entries with typed state tracking
//   • Immediate in-memory writes, asynchronous reconciliation
//   • Background worker with a cooperative, bounded-join stop
//   • Directory operations served straight from the remote host

pub mod service;
pub mod types;
pub mod worker;

mod commands;
mod dir_ops;

pub use service::SyncEngine;
pub use types::{SyncObserver, SyncState};
pub use worker::{SyncWorker, DEFAULT_JOIN_TIMEOUT, DEFAULT_SYNC_INTERVAL};
