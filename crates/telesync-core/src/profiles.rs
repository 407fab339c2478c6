//! Saved connection profiles.
//!
//! The credential-provider seam: a small YAML-backed store of named
//! connection profiles (`host specifier, auth type, key file, optional
//! second-hop node, remote project root`). The store holds *pointers* to
//! credentials (a key path, an auth type) — never secrets; whoever needs a
//! password prompts for it or fetches it elsewhere.

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::endpoint::AuthMethod;
use crate::error::{RemoteError, RemoteResult};

fn default_auth_type() -> AuthType {
    AuthType::Key
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    Key,
    Password,
    Agent,
}

/// One saved connection profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    pub name: String,
    /// Host specifier, `user@host[:port]`.
    pub host: String,
    #[serde(default = "default_auth_type")]
    pub auth_type: AuthType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<String>,
    /// Compute node reached by tunnelling through `host`, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jump_node: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_root: Option<String>,
}

impl ConnectionProfile {
    /// Resolve the auth material this profile points at. Password-type
    /// profiles use the password supplied by the caller (prompted or
    /// fetched elsewhere — never stored here); a missing key file or
    /// password falls back to the agent.
    pub fn auth_method(&self, password: Option<String>) -> AuthMethod {
        match self.auth_type {
            AuthType::Key => match &self.key_file {
                Some(path) => AuthMethod::KeyFile {
                    path: path.into(),
                    passphrase: None,
                },
                None => AuthMethod::Agent,
            },
            AuthType::Password => match password {
                Some(password) => AuthMethod::Password(password),
                None => AuthMethod::Agent,
            },
            AuthType::Agent => AuthMethod::Agent,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProfileFile {
    #[serde(default)]
    connections: Vec<ConnectionProfile>,
}

/// YAML-backed profile store. Load-on-open, write-through on mutation.
pub struct ProfileStore {
    path: PathBuf,
    profiles: Vec<ConnectionProfile>,
}

impl ProfileStore {
    /// Default location: `~/.telesync/connections.yaml`.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".telesync")
            .join("connections.yaml")
    }

    /// Open a store at `path`. A missing or unreadable file yields an
    /// empty store rather than an error; a corrupt file is logged and
    /// treated as empty so one bad edit never locks the user out.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let profiles = match fs::read_to_string(&path) {
            Ok(raw) => match serde_yaml::from_str::<ProfileFile>(&raw) {
                Ok(file) => file.connections,
                Err(e) => {
                    warn!("ignoring corrupt profile file {}: {}", path.display(), e);
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        Self { path, profiles }
    }

    pub fn open_default() -> Self {
        Self::open(Self::default_path())
    }

    pub fn file_path(&self) -> &Path {
        &self.path
    }

    pub fn list(&self) -> &[ConnectionProfile] {
        &self.profiles
    }

    pub fn get(&self, name: &str) -> Option<&ConnectionProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Insert or replace a profile by name.
    pub fn save(&mut self, profile: ConnectionProfile) -> RemoteResult<()> {
        match self.profiles.iter_mut().find(|p| p.name == profile.name) {
            Some(existing) => *existing = profile,
            None => self.profiles.push(profile),
        }
        self.persist()
    }

    /// Remove a profile by name. Returns whether it existed.
    pub fn remove(&mut self, name: &str) -> RemoteResult<bool> {
        let before = self.profiles.len();
        self.profiles.retain(|p| p.name != name);
        if self.profiles.len() == before {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    fn persist(&self) -> RemoteResult<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| RemoteError::io(format!("creating {}: {}", dir.display(), e)))?;
        }
        let file = ProfileFile {
            connections: self.profiles.clone(),
        };
        let raw = serde_yaml::to_string(&file)
            .map_err(|e| RemoteError::io(format!("serialising profiles: {}", e)))?;
        fs::write(&self.path, raw)
            .map_err(|e| RemoteError::io(format!("writing {}: {}", self.path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str) -> ConnectionProfile {
        ConnectionProfile {
            name: name.to_string(),
            host: format!("alice@{}.example", name),
            auth_type: AuthType::Key,
            key_file: Some("/home/alice/.ssh/id_ed25519".to_string()),
            jump_node: None,
            remote_root: Some("/data/projects/demo".to_string()),
        }
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("connections.yaml");

        let mut store = ProfileStore::open(&path);
        assert!(store.list().is_empty());
        store.save(profile("cluster")).unwrap();
        store.save(profile("staging")).unwrap();

        let reloaded = ProfileStore::open(&path);
        assert_eq!(reloaded.list().len(), 2);
        assert_eq!(reloaded.get("cluster"), Some(&profile("cluster")));
    }

    #[test]
    fn save_replaces_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ProfileStore::open(dir.path().join("c.yaml"));

        store.save(profile("cluster")).unwrap();
        let mut updated = profile("cluster");
        updated.host = "alice@other.example:2200".to_string();
        store.save(updated.clone()).unwrap();

        assert_eq!(store.list().len(), 1);
        assert_eq!(store.get("cluster"), Some(&updated));
    }

    #[test]
    fn remove_reports_presence() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ProfileStore::open(dir.path().join("c.yaml"));
        store.save(profile("cluster")).unwrap();

        assert!(store.remove("cluster").unwrap());
        assert!(!store.remove("cluster").unwrap());
    }

    #[test]
    fn auth_method_resolution() {
        let with_key = profile("cluster");
        assert!(matches!(
            with_key.auth_method(None),
            AuthMethod::KeyFile { .. }
        ));

        let mut with_password = profile("cluster");
        with_password.auth_type = AuthType::Password;
        with_password.key_file = None;
        assert!(matches!(
            with_password.auth_method(Some("hunter2".into())),
            AuthMethod::Password(_)
        ));
        // No password supplied: fall back to the agent.
        assert!(matches!(with_password.auth_method(None), AuthMethod::Agent));
    }

    #[test]
    fn corrupt_file_yields_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.yaml");
        fs::write(&path, ": not valid yaml [").unwrap();

        let store = ProfileStore::open(&path);
        assert!(store.list().is_empty());
    }
}
