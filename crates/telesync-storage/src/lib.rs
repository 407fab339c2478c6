//! # telesync – storage
//!
//! One capability set over a project's file tree, whether it lives on the
//! local filesystem or behind a synchronized remote session. Callers hold
//! a `dyn ProjectStorage` and never branch on the variant.

pub mod storage;

pub use storage::{LocalStorage, ProjectStorage, RemoteStorage};
