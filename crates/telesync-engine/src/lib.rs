//! # telesync – sync engine
//!
//! Makes remote storage behave like a fast, always-writable local cache:
//! writes land in memory immediately, a background worker pushes pending
//! changes to the remote host, and failures are isolated per path.

pub mod sync;

pub use sync::{
    SyncEngine, SyncObserver, SyncState, SyncWorker, DEFAULT_JOIN_TIMEOUT, DEFAULT_SYNC_INTERVAL,
};
