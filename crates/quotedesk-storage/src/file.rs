//! File-backed credential storage.

use crate::{CredentialStorage, StorageError, StorageResult};
use quotedesk_core::Paths;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

/// Credential storage backed by a single JSON object file.
///
/// All writes go through a temp-file-plus-rename commit, so a crash
/// mid-write never leaves a half-written store and multi-key updates
/// land all-or-none. A corrupt or unreadable file is treated as an
/// empty store, never surfaced as an error.
pub struct FileStorage {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileStorage {
    /// Create a storage over the given file path.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// Create a storage over the standard credentials file location.
    pub fn for_paths(paths: &Paths) -> Self {
        Self::new(paths.credentials_file())
    }

    fn read_map(&self) -> BTreeMap<String, String> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return BTreeMap::new(),
        };

        match serde_json::from_str(&content) {
            Ok(map) => map,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "credential store is corrupt, treating as empty");
                BTreeMap::new()
            }
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(map)
            .map_err(|e| StorageError::Encoding(e.to_string()))?;

        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, content)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn guard(&self) -> StorageResult<std::sync::MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| StorageError::Backend("storage lock poisoned".to_string()))
    }
}

impl CredentialStorage for FileStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let _guard = self.guard()?;
        let mut map = self.read_map();
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let _guard = self.guard()?;
        Ok(self.read_map().get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let _guard = self.guard()?;
        let mut map = self.read_map();
        if map.remove(key).is_none() {
            return Ok(false);
        }
        self.write_map(&map)?;
        Ok(true)
    }

    fn set_many(&self, pairs: &[(&str, &str)]) -> StorageResult<()> {
        let _guard = self.guard()?;
        let mut map = self.read_map();
        for (key, value) in pairs {
            map.insert(key.to_string(), value.to_string());
        }
        self.write_map(&map)
    }

    fn delete_many(&self, keys: &[&str]) -> StorageResult<()> {
        let _guard = self.guard()?;
        let mut map = self.read_map();
        let mut changed = false;
        for key in keys {
            changed |= map.remove(*key).is_some();
        }
        if changed {
            self.write_map(&map)?;
        }
        Ok(())
    }
}
