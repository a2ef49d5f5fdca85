mod error;
mod settings;

pub use self::error::StorageError;
pub use self::settings::SettingsStore;

/// Durable string-keyed store for small client-side settings.
///
/// Values persist across process restarts; a missing key reads as `None`.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn put(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}
