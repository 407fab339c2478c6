// ── LocalStorage – direct filesystem backing ─────────────────────────────────

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use telesync_core::path::validate_rel_path;
use telesync_core::{RemoteError, RemoteResult};

use super::ProjectStorage;

/// Delegates every operation 1:1 to the local filesystem under a fixed
/// project root.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &str) -> RemoteResult<PathBuf> {
        validate_rel_path(path)?;
        if path.is_empty() {
            Ok(self.root.clone())
        } else {
            Ok(self.root.join(path))
        }
    }

    /// A joined path back to its root-relative, slash-separated form.
    fn relative(&self, full: &Path) -> Option<String> {
        let rel = full.strip_prefix(&self.root).ok()?;
        let joined = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        Some(joined)
    }
}

impl ProjectStorage for LocalStorage {
    fn read_file(&self, path: &str) -> RemoteResult<String> {
        let full = self.full_path(path)?;
        fs::read_to_string(&full).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => RemoteError::not_found(path),
            _ => RemoteError::io(format!("reading '{}': {}", full.display(), e)),
        })
    }

    fn write_file(&self, path: &str, content: &str) -> RemoteResult<()> {
        let full = self.full_path(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| RemoteError::io(format!("creating '{}': {}", parent.display(), e)))?;
        }
        fs::write(&full, content)
            .map_err(|e| RemoteError::io(format!("writing '{}': {}", full.display(), e)))
    }

    fn list_dir(&self, path: &str) -> RemoteResult<Vec<String>> {
        let full = self.full_path(path)?;
        if !full.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        let entries = fs::read_dir(&full)
            .map_err(|e| RemoteError::io(format!("listing '{}': {}", full.display(), e)))?;
        for entry in entries {
            let entry =
                entry.map_err(|e| RemoteError::io(format!("listing '{}': {}", full.display(), e)))?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn exists(&self, path: &str) -> bool {
        self.full_path(path).map(|p| p.exists()).unwrap_or(false)
    }

    fn glob(&self, pattern: &str) -> RemoteResult<Vec<String>> {
        validate_rel_path(pattern)?;
        let full_pattern = self.root.join(pattern);
        let matches = glob::glob(&full_pattern.to_string_lossy())
            .map_err(|e| RemoteError::invalid_path(format!("pattern '{}': {}", pattern, e)))?;

        let mut paths = Vec::new();
        for entry in matches {
            let entry = entry.map_err(|e| RemoteError::io(e.to_string()))?;
            if let Some(rel) = self.relative(&entry) {
                paths.push(rel);
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn mkdir(&self, path: &str) -> RemoteResult<()> {
        let full = self.full_path(path)?;
        fs::create_dir_all(&full)
            .map_err(|e| RemoteError::io(format!("creating '{}': {}", full.display(), e)))
    }

    fn delete(&self, path: &str) -> RemoteResult<()> {
        let full = self.full_path(path)?;
        if full.is_file() {
            fs::remove_file(&full)
                .map_err(|e| RemoteError::io(format!("removing '{}': {}", full.display(), e)))
        } else if full.is_dir() {
            fs::remove_dir(&full)
                .map_err(|e| RemoteError::io(format!("removing '{}': {}", full.display(), e)))
        } else {
            Ok(())
        }
    }
}
