use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Backend error: {0}")]
    BackendError(String),
}

impl From<tonic::transport::Error> for NetworkError {
    fn from(err: tonic::transport::Error) -> Self {
        NetworkError::TransportError(err.to_string())
    }
}

impl From<tonic::Status> for NetworkError {
    fn from(status: tonic::Status) -> Self {
        NetworkError::RpcError(status.to_string())
    }
}

pub mod client;

pub use client::{ClusterClient, CredResolverClient};

pub mod proto {
    tonic::include_proto!("kubeconfig");
}
