pub mod cluster;
pub mod config;
pub mod credentials;
pub mod network;
pub mod notify;
pub mod storage;

// Public exports
pub use cluster::{ClusterMetadataStore, ClusterService, RefreshWorker, SyncClock, SyncState};
pub use config::Config;
pub use network::NetworkError;
pub use storage::{KeyValueStore, SettingsStore, StorageError};
