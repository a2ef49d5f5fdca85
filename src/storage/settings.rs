use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::storage::error::StorageError;
use crate::storage::KeyValueStore;

/// JSON-file-backed settings store.
///
/// The whole map is rewritten on every mutation via a temp file and rename,
/// so readers never observe a partially written file.
pub struct SettingsStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl SettingsStore {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let values = match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path: path.to_path_buf(),
            values,
        })
    }

    fn persist(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("tmp");
        let raw = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for SettingsStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values.insert(key.to_string(), value.to_string());
        self.persist()
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        if self.values.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::open(&dir.path().join("settings.json")).unwrap();
        assert!(store.get("lastSynced").unwrap().is_none());
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        {
            let mut store = SettingsStore::open(&path).unwrap();
            store.put("lastSynced", "2024-01-01T00:00:00+00:00").unwrap();
        }

        let store = SettingsStore::open(&path).unwrap();
        assert_eq!(
            store.get("lastSynced").unwrap().as_deref(),
            Some("2024-01-01T00:00:00+00:00")
        );
    }

    #[test]
    fn rewrite_keeps_unrelated_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut store = SettingsStore::open(&path).unwrap();
        store.put("a", "1").unwrap();
        store.put("b", "2").unwrap();
        store.put("a", "3").unwrap();

        let store = SettingsStore::open(&path).unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("3"));
        assert_eq!(store.get("b").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn remove_deletes_the_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut store = SettingsStore::open(&path).unwrap();
        store.put("a", "1").unwrap();
        store.remove("a").unwrap();
        assert!(store.get("a").unwrap().is_none());

        let store = SettingsStore::open(&path).unwrap();
        assert!(store.get("a").unwrap().is_none());
    }

    #[test]
    fn open_creates_parent_dirs_on_first_put() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut store = SettingsStore::open(&path).unwrap();
        store.put("k", "v").unwrap();
        assert!(path.exists());
    }
}
