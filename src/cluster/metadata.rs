use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMetadata {
    pub cluster_name: String,
    pub cred_resolver_id: String,
    pub cluster_tags: HashMap<String, String>,
}

/// Registration/suggestion status the backend reports for a cluster,
/// crossed with the health of its credential resolver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterInformationStatus {
    #[default]
    NotSetted,
    SuggestionOk,
    SuggestionNoCredResolver,
    SuggestionCredResolverNotOk,
    RegisteredNoCredResolver,
    RegisteredCredResolverNotOk,
    RegisteredOk,
    RegisteredUnknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedClusterMetadata {
    pub metadata: ClusterMetadata,
    /// Descriptions of the backend resolvers that contributed this entry.
    pub data_resolvers: Vec<String>,
    pub status: ClusterInformationStatus,
}
