use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::watch;

use kubesync::cluster::{
    AggregatedClusterMetadata, ClusterInformationStatus, ClusterMetadata, ClusterMetadataStore,
    ClusterService, RefreshError, SyncClock, SyncState,
};
use kubesync::network::NetworkError;
use kubesync::notify::{forward_errors, NotificationStore};
use kubesync::storage::{KeyValueStore, StorageError};

/// Shared in-memory settings store so tests can inspect persisted state.
#[derive(Clone, Default)]
struct MemStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemStore {
    fn get_raw(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }
}

impl KeyValueStore for MemStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.values.lock().unwrap().remove(key);
        Ok(())
    }
}

#[derive(Default)]
struct Observed {
    state_during_sync: Option<SyncState>,
    items_len_during_sync: Option<usize>,
    state_during_fetch: Option<SyncState>,
}

/// Scripted backend double. Results are consumed per call; an empty script
/// means success with no clusters. When attached to a store, it records the
/// observable state/items as seen from inside each phase.
#[derive(Default)]
struct ScriptedService {
    sync_results: Mutex<VecDeque<Result<(), NetworkError>>>,
    fetch_results: Mutex<VecDeque<Result<Vec<AggregatedClusterMetadata>, NetworkError>>>,
    sync_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    state_rx: Mutex<Option<watch::Receiver<SyncState>>>,
    items_rx: Mutex<Option<watch::Receiver<Vec<AggregatedClusterMetadata>>>>,
    observed: Mutex<Observed>,
}

impl ScriptedService {
    fn push_sync(&self, result: Result<(), NetworkError>) {
        self.sync_results.lock().unwrap().push_back(result);
    }

    fn push_fetch(&self, result: Result<Vec<AggregatedClusterMetadata>, NetworkError>) {
        self.fetch_results.lock().unwrap().push_back(result);
    }

    fn attach(&self, store: &ClusterMetadataStore) {
        *self.state_rx.lock().unwrap() = Some(store.state());
        *self.items_rx.lock().unwrap() = Some(store.items());
    }

    fn sync_calls(&self) -> usize {
        self.sync_calls.load(Ordering::SeqCst)
    }

    fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterService for ScriptedService {
    async fn sync_available_clusters(&self) -> Result<(), NetworkError> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(rx) = self.state_rx.lock().unwrap().as_ref() {
            self.observed.lock().unwrap().state_during_sync = Some(*rx.borrow());
        }
        if let Some(rx) = self.items_rx.lock().unwrap().as_ref() {
            self.observed.lock().unwrap().items_len_during_sync = Some(rx.borrow().len());
        }

        self.sync_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn get_available_clusters(
        &self,
    ) -> Result<Vec<AggregatedClusterMetadata>, NetworkError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(rx) = self.state_rx.lock().unwrap().as_ref() {
            self.observed.lock().unwrap().state_during_fetch = Some(*rx.borrow());
        }

        self.fetch_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

fn cluster(name: &str) -> AggregatedClusterMetadata {
    AggregatedClusterMetadata {
        metadata: ClusterMetadata {
            cluster_name: name.to_string(),
            cred_resolver_id: String::new(),
            cluster_tags: HashMap::new(),
        },
        data_resolvers: vec!["kubeconfig".to_string()],
        status: ClusterInformationStatus::RegisteredOk,
    }
}

fn never_synced_store(service: Arc<ScriptedService>) -> (ClusterMetadataStore, MemStore) {
    let mem = MemStore::default();
    let clock = SyncClock::new(Box::new(mem.clone()));
    (ClusterMetadataStore::new(service, clock), mem)
}

fn rpc_error(message: &str) -> NetworkError {
    NetworkError::RpcError(message.to_string())
}

#[tokio::test]
async fn successful_refresh_updates_items_and_clock() {
    let service = Arc::new(ScriptedService::default());
    service.push_fetch(Ok(vec![cluster("prod-1"), cluster("dev-1")]));

    let (store, mem) = never_synced_store(Arc::clone(&service));
    let mut errors = store.subscribe_errors();
    let state = store.state();

    assert_eq!(*state.borrow(), SyncState::Ready);
    store.refresh(false).await;
    assert_eq!(*state.borrow(), SyncState::Ready);

    let items = store.items().borrow().clone();
    let names: Vec<&str> = items
        .iter()
        .map(|i| i.metadata.cluster_name.as_str())
        .collect();
    assert_eq!(names, vec!["prod-1", "dev-1"], "backend order is preserved");

    assert_eq!(service.sync_calls(), 1);
    assert_eq!(service.fetch_calls(), 1);

    assert!(store.last_synced().await.is_some());
    assert!(mem.get_raw("lastSynced").is_some(), "clock was persisted");

    assert!(matches!(errors.try_recv(), Err(TryRecvError::Empty)));
    assert!(store.last_error().is_none());
}

#[tokio::test]
async fn sync_failure_does_not_abort_the_fetch() {
    let service = Arc::new(ScriptedService::default());
    service.push_sync(Err(rpc_error("backend unavailable")));
    service.push_fetch(Ok(vec![cluster("prod-1")]));

    let (store, mem) = never_synced_store(Arc::clone(&service));
    let mut errors = store.subscribe_errors();

    store.refresh(false).await;

    // The failed sync must not advance the clock...
    assert!(store.last_synced().await.is_none());
    assert!(mem.get_raw("lastSynced").is_none());

    // ...but the fetch still ran and replaced the items.
    assert_eq!(store.items().borrow().len(), 1);
    assert_eq!(*store.state().borrow(), SyncState::Ready);

    let event = errors.try_recv().expect("one error event");
    assert!(matches!(*event.error, RefreshError::SyncError(_)));
    assert!(matches!(errors.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn fetch_failure_leaves_items_empty() {
    let service = Arc::new(ScriptedService::default());
    service.push_fetch(Err(rpc_error("deadline exceeded")));

    let (store, _mem) = never_synced_store(Arc::clone(&service));
    let mut errors = store.subscribe_errors();

    store.refresh(false).await;

    assert!(store.items().borrow().is_empty());
    assert_eq!(*store.state().borrow(), SyncState::Ready);

    let event = errors.try_recv().expect("one error event");
    assert!(matches!(*event.error, RefreshError::FetchError(_)));
    assert_eq!(
        store.last_error().expect("last error recorded").occurrence,
        event.occurrence
    );
}

#[tokio::test]
async fn fresh_clock_skips_the_sync_phase() {
    let service = Arc::new(ScriptedService::default());
    service.push_fetch(Ok(vec![cluster("prod-1")]));

    let mem = MemStore::default();
    let mut clock = SyncClock::new(Box::new(mem.clone()));
    clock.mark_synced(Utc::now() - Duration::minutes(1));
    let store = ClusterMetadataStore::new(Arc::clone(&service) as Arc<dyn ClusterService>, clock);

    store.refresh(false).await;

    assert_eq!(service.sync_calls(), 0, "sync phase skipped while fresh");
    assert_eq!(service.fetch_calls(), 1, "fetch always runs");
    assert_eq!(store.items().borrow().len(), 1);
}

#[tokio::test]
async fn stale_persisted_clock_runs_the_sync_phase() {
    let service = Arc::new(ScriptedService::default());

    let mut mem = MemStore::default();
    let ten_minutes_ago = Utc::now() - Duration::minutes(10);
    mem.put("lastSynced", &ten_minutes_ago.to_rfc3339()).unwrap();

    let clock = SyncClock::new(Box::new(mem.clone()));
    let store = ClusterMetadataStore::new(Arc::clone(&service) as Arc<dyn ClusterService>, clock);

    store.refresh(false).await;

    assert_eq!(service.sync_calls(), 1);
    assert_eq!(service.fetch_calls(), 1);
    assert_eq!(*store.state().borrow(), SyncState::Ready);

    // The sync phase advanced the persisted clock.
    let persisted = mem.get_raw("lastSynced").unwrap();
    let reparsed = chrono::DateTime::parse_from_rfc3339(&persisted).unwrap();
    assert!(reparsed.with_timezone(&Utc) > ten_minutes_ago);
}

#[tokio::test]
async fn force_overrides_a_fresh_clock() {
    let service = Arc::new(ScriptedService::default());

    let mem = MemStore::default();
    let mut clock = SyncClock::new(Box::new(mem.clone()));
    clock.mark_synced(Utc::now());
    let store = ClusterMetadataStore::new(Arc::clone(&service) as Arc<dyn ClusterService>, clock);

    store.refresh(true).await;

    assert_eq!(service.sync_calls(), 1, "force bypasses the staleness gate");
    assert_eq!(service.fetch_calls(), 1);
}

#[tokio::test]
async fn identical_errors_produce_distinct_events() {
    let service = Arc::new(ScriptedService::default());
    service.push_fetch(Err(rpc_error("backend unavailable")));
    service.push_fetch(Err(rpc_error("backend unavailable")));

    let mem = MemStore::default();
    let mut clock = SyncClock::new(Box::new(mem.clone()));
    clock.mark_synced(Utc::now());
    let store = ClusterMetadataStore::new(Arc::clone(&service) as Arc<dyn ClusterService>, clock);
    let mut errors = store.subscribe_errors();

    store.refresh(false).await;
    store.refresh(false).await;

    let first = errors.try_recv().expect("first event");
    let second = errors.try_recv().expect("second event");

    assert_eq!(first.error.to_string(), second.error.to_string());
    assert_ne!(first.occurrence, second.occurrence);
    assert_ne!(first.key(), second.key());

    // last_error holds the newest occurrence.
    assert_eq!(store.last_error().unwrap().occurrence, second.occurrence);
}

#[tokio::test]
async fn items_are_empty_for_the_whole_sync_phase() {
    let service = Arc::new(ScriptedService::default());
    service.push_fetch(Ok(vec![cluster("prod-1")]));

    let (store, _mem) = never_synced_store(Arc::clone(&service));
    service.attach(&store);

    // Seed items from a previous cycle so the clearing is observable.
    store.refresh(true).await;
    assert_eq!(store.items().borrow().len(), 1);

    service.push_fetch(Ok(vec![cluster("prod-1")]));
    store.refresh(true).await;

    let observed = service.observed.lock().unwrap();
    assert_eq!(observed.items_len_during_sync, Some(0));
    assert_eq!(observed.state_during_sync, Some(SyncState::Syncing));
    assert_eq!(observed.state_during_fetch, Some(SyncState::Fetching));
}

#[tokio::test]
async fn overlapping_refreshes_both_complete() {
    let service = Arc::new(ScriptedService::default());
    service.push_fetch(Ok(vec![cluster("prod-1")]));
    service.push_fetch(Ok(vec![cluster("prod-2")]));

    let (store, _mem) = never_synced_store(Arc::clone(&service));
    let store = Arc::new(store);

    // No in-flight deduplication: both calls run the full sequence.
    let first = Arc::clone(&store).spawn_refresh(true);
    let second = Arc::clone(&store).spawn_refresh(true);
    first.await.unwrap();
    second.await.unwrap();

    assert_eq!(service.sync_calls(), 2);
    assert_eq!(service.fetch_calls(), 2);
    assert_eq!(*store.state().borrow(), SyncState::Ready);
    assert_eq!(store.items().borrow().len(), 1, "last fetch wins");
}

#[tokio::test]
async fn error_events_flow_into_the_notification_store() {
    let service = Arc::new(ScriptedService::default());
    service.push_fetch(Err(rpc_error("backend unavailable")));
    service.push_fetch(Err(rpc_error("backend unavailable")));

    let (store, _mem) = never_synced_store(Arc::clone(&service));
    let store = Arc::new(store);

    let sink = NotificationStore::new();
    let forwarder = tokio::spawn(forward_errors(store.subscribe_errors(), sink.clone()));

    store.refresh(true).await;
    store.refresh(true).await;

    // Dropping the store closes the channel and lets the forwarder finish.
    drop(store);
    forwarder.await.unwrap();

    let notifications = sink.take_all();
    assert_eq!(notifications.len(), 2);
    assert_eq!(notifications[0].message, notifications[1].message);
    assert_ne!(notifications[0].key, notifications[1].key);
}
