use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cluster::SyncClock;
use crate::storage::StorageError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub backend_address: String,
    pub resync_interval_minutes: i64,
    pub data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_address: "http://127.0.0.1:9090".to_string(),
            resync_interval_minutes: SyncClock::DEFAULT_RESYNC_INTERVAL_MINUTES,
            data_dir: default_data_dir(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kubesync")
}
