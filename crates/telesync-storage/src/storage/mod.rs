// ── telesync-storage / storage module ────────────────────────────────────────

pub mod local;
pub mod remote;

pub use local::LocalStorage;
pub use remote::RemoteStorage;

use telesync_core::RemoteResult;

/// Capability set shared by every backing store.
///
/// Paths are always project-relative and slash-separated; error semantics
/// are identical across variants so callers can switch the backing store
/// without code changes.
pub trait ProjectStorage: Send {
    /// Read a file's contents. Missing files are `NotFound`.
    fn read_file(&self, path: &str) -> RemoteResult<String>;

    /// Write content, creating missing parent directories.
    fn write_file(&self, path: &str, content: &str) -> RemoteResult<()>;

    /// Names inside a directory. A missing directory lists as empty.
    fn list_dir(&self, path: &str) -> RemoteResult<Vec<String>>;

    /// Whether the path exists.
    fn exists(&self, path: &str) -> bool;

    /// Paths matching a glob pattern, relative to the project root.
    fn glob(&self, pattern: &str) -> RemoteResult<Vec<String>>;

    /// Create a directory, parents included.
    fn mkdir(&self, path: &str) -> RemoteResult<()>;

    /// Delete a file or an empty directory.
    fn delete(&self, path: &str) -> RemoteResult<()>;
}
