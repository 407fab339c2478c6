//! Project-relative path discipline.
//!
//! Every tracked file is identified by a slash-separated path relative to
//! the project root. The same string is the cache key on both the local
//! and the remote side, so it must never be absolute and must never step
//! out of the root.

use crate::error::{RemoteError, RemoteResult};

/// Validate a project-relative path and hand it back.
///
/// Rejects absolute paths, backslash separators and any `..` segment.
/// The empty string is allowed; it refers to the project root itself.
pub fn validate_rel_path(path: &str) -> RemoteResult<&str> {
    if path.starts_with('/') {
        return Err(RemoteError::invalid_path(format!(
            "'{}' is absolute; project paths are relative to the root",
            path
        )));
    }
    if path.contains('\\') {
        return Err(RemoteError::invalid_path(format!(
            "'{}' uses backslashes; project paths are slash-separated",
            path
        )));
    }
    if path.split('/').any(|seg| seg == "..") {
        return Err(RemoteError::invalid_path(format!(
            "'{}' escapes the project root",
            path
        )));
    }
    Ok(path)
}

/// Join a project-relative path onto a root. Empty path means the root.
pub fn join_remote(root: &str, path: &str) -> String {
    let root = root.trim_end_matches('/');
    if path.is_empty() {
        root.to_string()
    } else {
        format!("{}/{}", root, path)
    }
}

/// The directory component of a slash-separated path, if any.
pub fn parent(path: &str) -> Option<&str> {
    match path.rsplit_once('/') {
        Some(("", _)) => Some("/"),
        Some((dir, _)) => Some(dir),
        None => None,
    }
}
