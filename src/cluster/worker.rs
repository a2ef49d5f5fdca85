use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use crate::cluster::store::ClusterMetadataStore;

/// Timer trigger: refreshes the metadata store on a fixed period.
///
/// Each cycle goes through the store's staleness gate, so a short period does
/// not translate into a backend sync per tick - only the fetch phase runs
/// while the clock is fresh. Errors are absorbed by the store; the loop never
/// exits on them.
pub struct RefreshWorker {
    store: Arc<ClusterMetadataStore>,
    period: Duration,
}

impl RefreshWorker {
    pub fn new(store: Arc<ClusterMetadataStore>, period: Duration) -> Self {
        Self { store, period }
    }

    pub async fn run(self) {
        loop {
            self.store.refresh(false).await;

            let count = self.store.items().borrow().len();
            log::info!("Cluster metadata refresh cycle complete ({count} clusters)");

            sleep(self.period).await;
        }
    }
}
