use chrono::{DateTime, Utc};

use crate::storage::KeyValueStore;

const LAST_SYNCED_KEY: &str = "lastSynced";

/// Tracks when cluster metadata was last synchronized and decides staleness.
///
/// The last-sync instant is persisted through the injected store so the
/// decision survives process restarts. Persistence is best-effort: a failed
/// write is logged and the in-memory value still updates.
pub struct SyncClock {
    last_synced: Option<DateTime<Utc>>,
    resync_interval_minutes: i64,
    store: Box<dyn KeyValueStore>,
}

impl SyncClock {
    pub const DEFAULT_RESYNC_INTERVAL_MINUTES: i64 = 5;

    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self::with_interval(store, Self::DEFAULT_RESYNC_INTERVAL_MINUTES)
    }

    pub fn with_interval(store: Box<dyn KeyValueStore>, resync_interval_minutes: i64) -> Self {
        let last_synced = match store.get(LAST_SYNCED_KEY) {
            Ok(Some(raw)) => parse_instant(&raw),
            Ok(None) => None,
            Err(e) => {
                log::warn!("Failed to read persisted last-synced time: {e}");
                None
            }
        };

        Self {
            last_synced,
            resync_interval_minutes,
            store,
        }
    }

    pub fn last_synced(&self) -> Option<DateTime<Utc>> {
        self.last_synced
    }

    pub fn resync_interval_minutes(&self) -> i64 {
        self.resync_interval_minutes
    }

    pub fn set_resync_interval(&mut self, minutes: i64) {
        self.resync_interval_minutes = minutes;
    }

    pub fn should_resync(&self) -> bool {
        self.stale_at(Utc::now())
    }

    /// Staleness at a given instant: never synced, or at least the configured
    /// number of whole minutes elapsed. Fractional minutes truncate, so
    /// 4 min 59 s is not stale at a 5 minute interval.
    pub fn stale_at(&self, now: DateTime<Utc>) -> bool {
        match self.last_synced {
            None => true,
            Some(last) => {
                now.signed_duration_since(last).num_minutes() >= self.resync_interval_minutes
            }
        }
    }

    pub fn mark_synced(&mut self, time: DateTime<Utc>) {
        self.last_synced = Some(time);
        if let Err(e) = self.store.put(LAST_SYNCED_KEY, &time.to_rfc3339()) {
            log::warn!("Failed to persist last-synced time: {e}");
        }
    }

    /// Back to the never-synced state; the next `should_resync` returns true.
    /// Persists the epoch sentinel, which reloads as stale.
    pub fn reset(&mut self) {
        self.last_synced = None;
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        if let Err(e) = self.store.put(LAST_SYNCED_KEY, &epoch.to_rfc3339()) {
            log::warn!("Failed to persist last-synced reset: {e}");
        }
    }
}

fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
