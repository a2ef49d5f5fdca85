mod clock;
mod error;
mod metadata;
mod store;
mod worker;

pub use self::clock::SyncClock;
pub use self::error::{ErrorEvent, RefreshError};
pub use self::metadata::{AggregatedClusterMetadata, ClusterInformationStatus, ClusterMetadata};
pub use self::store::{ClusterMetadataStore, SyncState};
pub use self::worker::RefreshWorker;

use async_trait::async_trait;

use crate::network::NetworkError;

/// Cluster metadata slice of the backend service.
///
/// Implemented by the gRPC adapter in production and by scripted fakes in
/// tests; the store only ever sees this trait.
#[async_trait]
pub trait ClusterService: Send + Sync {
    /// Ask the backend to rebuild its own cluster metadata cache. Idempotent.
    async fn sync_available_clusters(&self) -> Result<(), NetworkError>;

    /// Fetch the currently known cluster metadata set, in backend order.
    async fn get_available_clusters(
        &self,
    ) -> Result<Vec<AggregatedClusterMetadata>, NetworkError>;
}
