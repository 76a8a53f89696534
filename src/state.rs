//! State file tracking what has been applied
//!
//! Holds, per resource address, the attributes last read back from the
//! server. Stored as pretty JSON next to the config file unless `--state`
//! says otherwise.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use declarative::Attributes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Current state file format version
pub const STATE_VERSION: u32 = 1;

/// File name used next to the config file
pub const DEFAULT_FILE: &str = "smilecdr.state.json";

/// Stored state of one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    pub kind: String,
    /// Natural key, in import syntax
    pub id: String,
    pub attributes: Attributes,
    pub updated_at: DateTime<Utc>,
}

/// The whole state file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u32,
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceState>,
    pub last_updated: DateTime<Utc>,
    #[serde(skip)]
    path: PathBuf,
}

impl StateFile {
    /// An empty state bound to a path
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            version: STATE_VERSION,
            resources: BTreeMap::new(),
            last_updated: Utc::now(),
            path: path.into(),
        }
    }

    /// State path to use for a config file
    pub fn path_for(config_path: &Path, explicit: Option<&str>) -> PathBuf {
        match explicit {
            Some(path) => PathBuf::from(shellexpand::tilde(path).as_ref()),
            None => config_path
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join(DEFAULT_FILE),
        }
    }

    /// Load state from disk, or return an empty state if the file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file {} does not exist, starting empty", path.display());
            return Ok(Self::empty(path));
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;
        let mut state: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        if state.version > STATE_VERSION {
            bail!(
                "State file {} has version {}, this build understands up to {STATE_VERSION}",
                path.display(),
                state.version
            );
        }

        state.path = path.to_path_buf();
        log::debug!("Loaded {} resources from {}", state.resources.len(), path.display());
        Ok(state)
    }

    /// Save state to disk, stamping `last_updated`
    pub fn save(&mut self) -> Result<()> {
        self.last_updated = Utc::now();

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize state")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)
            .with_context(|| format!("Failed to write state file: {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace state file: {}", self.path.display()))?;

        log::debug!("Saved state to {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, address: &str) -> Option<&ResourceState> {
        self.resources.get(address)
    }

    /// Record a resource's state after apply or import
    pub fn record(&mut self, address: &str, kind: &str, id: String, attributes: Attributes) {
        self.resources.insert(
            address.to_string(),
            ResourceState {
                kind: kind.to_string(),
                id,
                attributes,
                updated_at: Utc::now(),
            },
        );
    }

    /// Forget a resource; returns whether it was tracked
    pub fn remove(&mut self, address: &str) -> bool {
        self.resources.remove(address).is_some()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs() -> Attributes {
        let mut a = Attributes::new();
        a.set_remote("module_id", "smart_in");
        a.set_remote("cache_authentication_seconds", 300);
        a
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateFile::load(&dir.path().join("state.json")).unwrap();
        assert!(state.is_empty());
        assert_eq!(state.version, STATE_VERSION);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let mut state = StateFile::empty(&path);
        state.record("smart_inbound_security.smart_in", "smart_inbound_security", "Master/smart_in".into(), attrs());
        state.save().unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = StateFile::load(&path).unwrap();
        let entry = loaded.get("smart_inbound_security.smart_in").unwrap();
        assert_eq!(entry.id, "Master/smart_in");
        assert_eq!(entry.attributes, attrs());
        assert_eq!(loaded.path(), path.as_path());
    }

    #[test]
    fn test_remove() {
        let mut state = StateFile::empty("state.json");
        state.record("user.jane", "user", "Master/local_security/1".into(), Attributes::new());
        assert!(state.remove("user.jane"));
        assert!(!state.remove("user.jane"));
    }

    #[test]
    fn test_rejects_newer_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, r#"{"version": 99, "resources": {}, "last_updated": "2024-01-01T00:00:00Z"}"#).unwrap();
        assert!(StateFile::load(&path).is_err());
    }

    #[test]
    fn test_path_next_to_config() {
        let path = StateFile::path_for(Path::new("/etc/cdr/smilecdr.toml"), None);
        assert_eq!(path, PathBuf::from("/etc/cdr/smilecdr.state.json"));
        let path = StateFile::path_for(Path::new("smilecdr.toml"), None);
        assert_eq!(path, PathBuf::from("smilecdr.state.json"));
        let path = StateFile::path_for(Path::new("smilecdr.toml"), Some("/tmp/s.json"));
        assert_eq!(path, PathBuf::from("/tmp/s.json"));
    }
}
