use anyhow::Result;
use async_trait::async_trait;
use common::{PodTask, ServiceTask, ShardCluster, StatefulSet};
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} {name} not found")]
    NotFound { kind: &'static str, name: String },
    #[error("status subresource updates are not supported by this backend")]
    SubresourceUnsupported,
    #[error("{kind} {name} was modified concurrently")]
    Conflict { kind: &'static str, name: String },
}

/// Read/write surface the status controller needs from the registry.
///
/// A handle is passed explicitly per invocation so tests can substitute an
/// in-memory fake for the etcd-backed store.
#[async_trait]
pub trait ClusterStore: Send + Sync {
    async fn get_shard_cluster(&self, name: &str) -> Result<Option<ShardCluster>>;

    /// List pods whose labels contain every pair of the selector.
    async fn list_pods(&self, selector: &HashMap<String, String>) -> Result<Vec<PodTask>>;

    /// A missing StatefulSet is an error (`StoreError::NotFound`), not an
    /// empty answer.
    async fn get_stateful_set(&self, name: &str) -> Result<StatefulSet>;

    async fn get_service(&self, name: &str) -> Result<ServiceTask>;

    /// Write only the status of an existing cluster object. Backends without
    /// subresource support answer `StoreError::SubresourceUnsupported`.
    async fn update_status(&self, cluster: &ShardCluster) -> Result<()>;

    /// Write the whole cluster object.
    async fn update_cluster(&self, cluster: &ShardCluster) -> Result<()>;
}
