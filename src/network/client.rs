use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tonic::transport::{Channel, Endpoint};
use tonic::Request;

use crate::cluster::{
    AggregatedClusterMetadata, ClusterInformationStatus, ClusterMetadata, ClusterService,
};
use crate::credentials::{
    CredResolverConfig, CredResolverKind, CredResolverService, CredResolverStatus,
};
use crate::network::proto;
use crate::network::proto::kubeconfig_client::KubeconfigClient;
use crate::network::NetworkError;

async fn connect(address: &str) -> Result<KubeconfigClient<Channel>, NetworkError> {
    let endpoint = Endpoint::from_shared(address.to_string())
        .map_err(|e| NetworkError::ConnectionError(e.to_string()))?;

    let channel = endpoint
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(5))
        .connect()
        .await?;

    Ok(KubeconfigClient::new(channel))
}

fn check_common(res: &proto::CommonRes) -> Result<(), NetworkError> {
    match res.status() {
        proto::ResultCode::Success => Ok(()),
        proto::ResultCode::Failed => Err(NetworkError::BackendError(res.message.clone())),
    }
}

/// Cluster metadata adapter over the backend's Kubeconfig service.
///
/// Connects on first use and keeps the channel for the client's lifetime.
pub struct ClusterClient {
    address: String,
    client: Mutex<Option<KubeconfigClient<Channel>>>,
}

impl ClusterClient {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            client: Mutex::new(None),
        }
    }

    async fn client(&self) -> Result<KubeconfigClient<Channel>, NetworkError> {
        let mut guard = self.client.lock().await;
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        let client = connect(&self.address).await?;
        *guard = Some(client.clone());
        Ok(client)
    }
}

#[async_trait]
impl ClusterService for ClusterClient {
    async fn sync_available_clusters(&self) -> Result<(), NetworkError> {
        let mut client = self.client().await?;
        let res = client
            .sync_available_clusters(Request::new(proto::CommonReq {}))
            .await?
            .into_inner();

        check_common(&res)
    }

    async fn get_available_clusters(
        &self,
    ) -> Result<Vec<AggregatedClusterMetadata>, NetworkError> {
        let mut client = self.client().await?;
        let res = client
            .get_available_clusters(Request::new(proto::CommonReq {}))
            .await?
            .into_inner();

        if let Some(common) = &res.common_res {
            check_common(common)?;
        }

        Ok(res.clusters.into_iter().map(Into::into).collect())
    }
}

/// Credential resolver adapter over the same service; request/response
/// forwarding only.
pub struct CredResolverClient {
    address: String,
    client: Mutex<Option<KubeconfigClient<Channel>>>,
}

impl CredResolverClient {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            client: Mutex::new(None),
        }
    }

    async fn client(&self) -> Result<KubeconfigClient<Channel>, NetworkError> {
        let mut guard = self.client.lock().await;
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        let client = connect(&self.address).await?;
        *guard = Some(client.clone());
        Ok(client)
    }
}

#[async_trait]
impl CredResolverService for CredResolverClient {
    async fn sync_available_cred_resolvers(&self) -> Result<(), NetworkError> {
        let mut client = self.client().await?;
        let res = client
            .sync_available_cred_resolvers(Request::new(proto::CommonReq {}))
            .await?
            .into_inner();

        check_common(&res)
    }

    async fn get_cred_resolvers(&self) -> Result<Vec<CredResolverConfig>, NetworkError> {
        let mut client = self.client().await?;
        let res = client
            .get_available_cred_resolvers(Request::new(proto::CommonReq {}))
            .await?
            .into_inner();

        if let Some(common) = &res.common_res {
            check_common(common)?;
        }

        Ok(res.configs.into_iter().map(Into::into).collect())
    }

    async fn set_cred_resolver(&self, config: &CredResolverConfig) -> Result<(), NetworkError> {
        let mut client = self.client().await?;
        let res = client
            .set_cred_resolver(Request::new(config.into()))
            .await?
            .into_inner();

        check_common(&res)
    }

    async fn delete_cred_resolver(&self, account_id: &str) -> Result<(), NetworkError> {
        let mut client = self.client().await?;
        let res = client
            .delete_cred_resolver(Request::new(proto::DeleteCredResolverReq {
                account_id: account_id.to_string(),
            }))
            .await?
            .into_inner();

        check_common(&res)
    }
}

impl From<proto::ClusterMetadata> for ClusterMetadata {
    fn from(m: proto::ClusterMetadata) -> Self {
        Self {
            cluster_name: m.cluster_name,
            cred_resolver_id: m.cred_resolver_id,
            cluster_tags: m.cluster_tags,
        }
    }
}

impl From<proto::ClusterInformationStatus> for ClusterInformationStatus {
    fn from(s: proto::ClusterInformationStatus) -> Self {
        use proto::ClusterInformationStatus as P;
        match s {
            P::InfoNotSetted => Self::NotSetted,
            P::SuggestionOk => Self::SuggestionOk,
            P::SuggestionNotokNoCredResolver => Self::SuggestionNoCredResolver,
            P::SuggestionNotokCredResNotok => Self::SuggestionCredResolverNotOk,
            P::RegisteredNotokNoCredResolver => Self::RegisteredNoCredResolver,
            P::RegisteredNotokCredResNotok => Self::RegisteredCredResolverNotOk,
            P::RegisteredOk => Self::RegisteredOk,
            P::RegisteredUnknown => Self::RegisteredUnknown,
        }
    }
}

impl From<proto::AggregatedClusterMetadata> for AggregatedClusterMetadata {
    fn from(m: proto::AggregatedClusterMetadata) -> Self {
        let status = m.status().into();
        Self {
            metadata: m.metadata.unwrap_or_default().into(),
            data_resolvers: m.data_resolvers,
            status,
        }
    }
}

impl From<proto::CredentialResolverKind> for CredResolverKind {
    fn from(k: proto::CredentialResolverKind) -> Self {
        use proto::CredentialResolverKind as P;
        match k {
            P::Default => Self::Default,
            P::Env => Self::Env,
            P::Imds => Self::Imds,
            P::Profile => Self::Profile,
        }
    }
}

impl From<CredResolverKind> for proto::CredentialResolverKind {
    fn from(k: CredResolverKind) -> Self {
        use proto::CredentialResolverKind as P;
        match k {
            CredResolverKind::Default => P::Default,
            CredResolverKind::Env => P::Env,
            CredResolverKind::Imds => P::Imds,
            CredResolverKind::Profile => P::Profile,
        }
    }
}

impl From<proto::CredentialResolverStatus> for CredResolverStatus {
    fn from(s: proto::CredentialResolverStatus) -> Self {
        use proto::CredentialResolverStatus as P;
        match s {
            P::CredResolverUnknown => Self::Unknown,
            P::CredRegisteredOk => Self::RegisteredOk,
            P::CredRegisteredNotOk => Self::RegisteredNotOk,
            P::CredSuggestionOk => Self::SuggestionOk,
        }
    }
}

impl From<proto::CredResolverConfig> for CredResolverConfig {
    fn from(c: proto::CredResolverConfig) -> Self {
        let kind = c.kind().into();
        let status = c.status().into();
        Self {
            account_id: c.account_id,
            infra_vendor: c.infra_vendor,
            account_alias: c.account_alias,
            kind,
            resolver_attributes: c.resolver_attributes,
            status,
        }
    }
}

impl From<&CredResolverConfig> for proto::CredResolverConfig {
    fn from(c: &CredResolverConfig) -> Self {
        Self {
            account_id: c.account_id.clone(),
            infra_vendor: c.infra_vendor.clone(),
            account_alias: c.account_alias.clone(),
            kind: proto::CredentialResolverKind::from(c.kind) as i32,
            resolver_attributes: c.resolver_attributes.clone(),
            // The backend owns resolver status; an upsert never asserts one.
            status: proto::CredentialResolverStatus::CredResolverUnknown as i32,
        }
    }
}
