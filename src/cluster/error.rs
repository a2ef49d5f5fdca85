use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use crate::network::NetworkError;

/// A refresh phase failure. Never propagated past the store boundary;
/// surfaced only through the error event channel.
#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("Cluster sync failed: {0}")]
    SyncError(NetworkError),

    #[error("Cluster fetch failed: {0}")]
    FetchError(NetworkError),
}

/// One observable error occurrence.
///
/// `occurrence` increases monotonically per store, so two consecutive errors
/// with identical text are still two distinct events.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    pub error: Arc<RefreshError>,
    pub at: DateTime<Utc>,
    pub occurrence: u64,
}

impl ErrorEvent {
    /// Human-readable key safe to use for notification deduplication.
    pub fn key(&self) -> String {
        format!(
            "{}#{}",
            self.at.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.occurrence
        )
    }
}
