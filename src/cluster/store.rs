use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use log::debug;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;

use crate::cluster::clock::SyncClock;
use crate::cluster::error::{ErrorEvent, RefreshError};
use crate::cluster::metadata::AggregatedClusterMetadata;
use crate::cluster::ClusterService;

/// Observable lifecycle of a refresh cycle. `Ready` is both the initial state
/// and the terminal state of every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Ready,
    Syncing,
    Fetching,
}

const ERROR_CHANNEL_CAPACITY: usize = 16;

/// Client-side store of the backend's cluster metadata.
///
/// `refresh` runs the two-phase protocol: an optional, staleness-gated sync
/// phase that tells the backend to rebuild its cache, then an unconditional
/// fetch phase that replaces the local items. State, items and errors are
/// observable; phase failures never escape the store.
pub struct ClusterMetadataStore {
    service: Arc<dyn ClusterService>,
    clock: Mutex<SyncClock>,
    state_tx: watch::Sender<SyncState>,
    items_tx: watch::Sender<Vec<AggregatedClusterMetadata>>,
    error_tx: broadcast::Sender<ErrorEvent>,
    last_error: StdMutex<Option<ErrorEvent>>,
    occurrence: AtomicU64,
}

impl ClusterMetadataStore {
    pub fn new(service: Arc<dyn ClusterService>, clock: SyncClock) -> Self {
        let (state_tx, _) = watch::channel(SyncState::Ready);
        let (items_tx, _) = watch::channel(Vec::new());
        let (error_tx, _) = broadcast::channel(ERROR_CHANNEL_CAPACITY);

        Self {
            service,
            clock: Mutex::new(clock),
            state_tx,
            items_tx,
            error_tx,
            last_error: StdMutex::new(None),
            occurrence: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> watch::Receiver<SyncState> {
        self.state_tx.subscribe()
    }

    pub fn items(&self) -> watch::Receiver<Vec<AggregatedClusterMetadata>> {
        self.items_tx.subscribe()
    }

    pub fn subscribe_errors(&self) -> broadcast::Receiver<ErrorEvent> {
        self.error_tx.subscribe()
    }

    pub fn last_error(&self) -> Option<ErrorEvent> {
        self.last_error.lock().unwrap().clone()
    }

    pub async fn last_synced(&self) -> Option<chrono::DateTime<Utc>> {
        self.clock.lock().await.last_synced()
    }

    /// Run one refresh cycle.
    ///
    /// Items are cleared before any network activity, so observers see an
    /// empty collection for the whole sync phase. The sync phase runs only
    /// when forced or stale; the fetch phase always runs; the state always
    /// returns to `Ready`. Overlapping calls are not serialized here -
    /// callers wanting at-most-one-in-flight must enforce it themselves.
    pub async fn refresh(&self, force: bool) {
        self.items_tx.send_replace(Vec::new());

        let resync = force || self.clock.lock().await.should_resync();
        if resync {
            debug!("Requesting backend cluster metadata sync");
            self.state_tx.send_replace(SyncState::Syncing);

            match self.service.sync_available_clusters().await {
                Ok(()) => self.clock.lock().await.mark_synced(Utc::now()),
                Err(e) => self.report_error(RefreshError::SyncError(e)),
            }
        }

        debug!("Requesting backend cluster metadata fetch");
        self.state_tx.send_replace(SyncState::Fetching);

        match self.service.get_available_clusters().await {
            Ok(items) => {
                self.items_tx.send_replace(items);
            }
            Err(e) => self.report_error(RefreshError::FetchError(e)),
        }

        debug!("Cluster metadata refresh done");
        self.state_tx.send_replace(SyncState::Ready);
    }

    /// Fire-and-forget variant for timer and UI triggers.
    pub fn spawn_refresh(self: Arc<Self>, force: bool) -> JoinHandle<()> {
        tokio::spawn(async move { self.refresh(force).await })
    }

    fn report_error(&self, error: RefreshError) {
        log::error!("{error}");

        let event = ErrorEvent {
            error: Arc::new(error),
            at: Utc::now(),
            occurrence: self.occurrence.fetch_add(1, Ordering::Relaxed),
        };

        *self.last_error.lock().unwrap() = Some(event.clone());
        // No subscribers is fine; the event is still recorded as last_error.
        let _ = self.error_tx.send(event);
    }
}
