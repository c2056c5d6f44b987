use crate::api::store::{ClusterStore, StoreError};
use anyhow::Result;
use async_trait::async_trait;
use common::{PodTask, ServiceTask, ShardCluster, StatefulSet};
use etcd_client::{Client, Compare, CompareOp, GetOptions, Txn, TxnOp};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// EtcdStore provides the registry API backing the operator.
/// Keys are stored under `/registry/shardclusters/`, `/registry/pods/`,
/// `/registry/statefulsets/` and `/registry/services/`.
/// Values are YAML serialized definitions.
#[derive(Clone)]
pub struct EtcdStore {
    client: Arc<RwLock<Client>>,
}

impl EtcdStore {
    /// Create a new EtcdStore instance by connecting to the given endpoints.
    pub async fn new(endpoints: Vec<String>) -> Result<Self> {
        let client = Client::connect(endpoints, None).await?;
        Ok(Self {
            client: Arc::new(RwLock::new(client)),
        })
    }

    /// List all shard cluster names (keys only, values are ignored).
    pub async fn list_shard_cluster_names(&self) -> Result<Vec<String>> {
        let key = "/registry/shardclusters/".to_string();
        let mut client = self.client.write().await;
        let resp = client
            .get(
                key.clone(),
                Some(GetOptions::new().with_prefix().with_keys_only()),
            )
            .await?;
        Ok(resp
            .kvs()
            .iter()
            .map(|kv| String::from_utf8_lossy(kv.key()).replace("/registry/shardclusters/", ""))
            .collect())
    }

    pub async fn insert_shard_cluster_yaml(&self, name: &str, yaml: &str) -> Result<()> {
        let key = format!("/registry/shardclusters/{name}");
        let mut client = self.client.write().await;
        client.put(key, yaml, None).await?;
        Ok(())
    }

    async fn get_yaml_with_revision(&self, key: String) -> Result<Option<(String, i64)>> {
        let mut client = self.client.write().await;
        let resp = client.get(key, None).await?;
        Ok(resp.kvs().first().map(|kv| {
            (
                String::from_utf8_lossy(kv.value()).to_string(),
                kv.mod_revision(),
            )
        }))
    }

    async fn get_yaml(&self, key: String) -> Result<Option<String>> {
        let mut client = self.client.write().await;
        let resp = client.get(key, None).await?;
        Ok(resp
            .kvs()
            .first()
            .map(|kv| String::from_utf8_lossy(kv.value()).to_string()))
    }

    /// Put `yaml` only if the key is still at `expected_mod_revision`.
    async fn compare_and_set_yaml(
        &self,
        key: String,
        expected_mod_revision: i64,
        yaml: &str,
    ) -> Result<bool> {
        let cmp = Compare::mod_revision(key.clone(), CompareOp::Equal, expected_mod_revision);
        let then_ops = vec![TxnOp::put(key.clone(), yaml, None)];
        let else_ops = vec![TxnOp::get(key, None)];
        let mut client = self.client.write().await;
        let txn = Txn::new()
            .when(vec![cmp])
            .and_then(then_ops)
            .or_else(else_ops);
        let resp = client.txn(txn).await?;
        Ok(resp.succeeded())
    }
}

#[async_trait]
impl ClusterStore for EtcdStore {
    async fn get_shard_cluster(&self, name: &str) -> Result<Option<ShardCluster>> {
        let key = format!("/registry/shardclusters/{name}");
        match self.get_yaml(key).await? {
            Some(yaml) => Ok(Some(serde_yaml::from_str(&yaml)?)),
            None => Ok(None),
        }
    }

    async fn list_pods(&self, selector: &HashMap<String, String>) -> Result<Vec<PodTask>> {
        let key = "/registry/pods/".to_string();
        let mut client = self.client.write().await;
        let resp = client
            .get(key.clone(), Some(GetOptions::new().with_prefix()))
            .await?;

        let pods: Vec<PodTask> = resp
            .kvs()
            .iter()
            .filter_map(|kv| {
                let yaml_str = String::from_utf8_lossy(kv.value());
                serde_yaml::from_str::<PodTask>(&yaml_str).ok()
            })
            .filter(|pod| {
                selector
                    .iter()
                    .all(|(k, v)| pod.metadata.labels.get(k) == Some(v))
            })
            .collect();

        Ok(pods)
    }

    async fn get_stateful_set(&self, name: &str) -> Result<StatefulSet> {
        let key = format!("/registry/statefulsets/{name}");
        let yaml = self.get_yaml(key).await?.ok_or(StoreError::NotFound {
            kind: "statefulset",
            name: name.to_string(),
        })?;
        Ok(serde_yaml::from_str(&yaml)?)
    }

    async fn get_service(&self, name: &str) -> Result<ServiceTask> {
        let key = format!("/registry/services/{name}");
        let yaml = self.get_yaml(key).await?.ok_or(StoreError::NotFound {
            kind: "service",
            name: name.to_string(),
        })?;
        Ok(serde_yaml::from_str(&yaml)?)
    }

    async fn update_status(&self, cluster: &ShardCluster) -> Result<()> {
        let name = &cluster.metadata.name;
        let key = format!("/registry/shardclusters/{name}");
        let (yaml, rev) =
            self.get_yaml_with_revision(key.clone())
                .await?
                .ok_or(StoreError::NotFound {
                    kind: "shardcluster",
                    name: name.clone(),
                })?;

        // splice the fresh status into the stored object so concurrent spec
        // edits are not clobbered
        let mut stored: ShardCluster = serde_yaml::from_str(&yaml)?;
        stored.status = cluster.status.clone();
        let updated = serde_yaml::to_string(&stored)?;

        if !self.compare_and_set_yaml(key, rev, &updated).await? {
            return Err(StoreError::Conflict {
                kind: "shardcluster",
                name: name.clone(),
            }
            .into());
        }
        Ok(())
    }

    async fn update_cluster(&self, cluster: &ShardCluster) -> Result<()> {
        let yaml = serde_yaml::to_string(cluster)?;
        self.insert_shard_cluster_yaml(&cluster.metadata.name, &yaml)
            .await
    }
}
