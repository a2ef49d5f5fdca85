use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::network::NetworkError;

/// How a credential resolver obtains cloud credentials.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredResolverKind {
    #[default]
    Default,
    Env,
    Imds,
    Profile,
}

/// Backend-reported health of a registered resolver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredResolverStatus {
    #[default]
    Unknown,
    RegisteredOk,
    RegisteredNotOk,
    SuggestionOk,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredResolverConfig {
    pub account_id: String,
    pub infra_vendor: String,
    pub account_alias: String,
    pub kind: CredResolverKind,
    pub resolver_attributes: HashMap<String, String>,
    /// Owned by the backend; ignored on upsert.
    pub status: CredResolverStatus,
}

/// Credential resolver slice of the backend service. Four request/response
/// forwards, no orchestration.
#[async_trait]
pub trait CredResolverService: Send + Sync {
    /// Ask the backend to rediscover available credential resolvers.
    async fn sync_available_cred_resolvers(&self) -> Result<(), NetworkError>;

    async fn get_cred_resolvers(&self) -> Result<Vec<CredResolverConfig>, NetworkError>;

    /// Upsert keyed by `account_id`.
    async fn set_cred_resolver(&self, config: &CredResolverConfig) -> Result<(), NetworkError>;

    async fn delete_cred_resolver(&self, account_id: &str) -> Result<(), NetworkError>;
}

impl CredResolverKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "default" => Some(Self::Default),
            "env" => Some(Self::Env),
            "imds" => Some(Self::Imds),
            "profile" => Some(Self::Profile),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!(CredResolverKind::parse("profile"), Some(CredResolverKind::Profile));
        assert_eq!(CredResolverKind::parse("IMDS"), Some(CredResolverKind::Imds));
        assert_eq!(CredResolverKind::parse("Env"), Some(CredResolverKind::Env));
        assert_eq!(CredResolverKind::parse("default"), Some(CredResolverKind::Default));
        assert_eq!(CredResolverKind::parse("keyring"), None);
    }
}
