use crate::api::store::{ClusterStore, StoreError};
use crate::controllers::Controller;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::{
    AppState, ClusterCondition, ClusterConditionType, ConditionStatus, MemberSetSpec,
    MemberSetStatus, PodCondition, PodConditionType, PodTask, ShardCluster,
};
use log::{error, info};
use std::collections::HashMap;
use std::sync::Arc;

/// Caller intent for the cycle, distinct from observed reality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesiredPhase {
    Initializing,
    Settled,
}

/// StatusController summarizes the observed health of a ShardCluster into its
/// status and resolves the externally reachable address. It never creates or
/// mutates workload objects.
pub struct StatusController {}

impl StatusController {
    pub fn new() -> Self {
        Self {}
    }

    /// Compute the whole cluster status from observation and persist it.
    ///
    /// A `reconcile_err` reported by the caller takes precedence over
    /// everything: the error is recorded and persisted immediately, member
    /// sets are not evaluated.
    pub async fn update_status(
        &self,
        cluster: &mut ShardCluster,
        reconcile_err: Option<&anyhow::Error>,
        phase: DesiredPhase,
        store: &dyn ClusterStore,
    ) -> Result<()> {
        if let Some(err) = reconcile_err {
            cluster.status.push_condition(ClusterCondition {
                status: ConditionStatus::True,
                condition_type: ClusterConditionType::Error,
                reason: Some("ErrorReconcile".to_string()),
                message: Some(format!("{err:#}")),
                last_transition_time: Utc::now().to_rfc3339(),
            });
            cluster.status.message = format!("Error: {err:#}");
            cluster.status.state = AppState::Error;
            return self.write_status(cluster, store).await;
        }

        cluster.status.message.clear();

        let member_sets: Vec<MemberSetSpec> = cluster
            .spec
            .member_sets_with_config()
            .into_iter()
            .cloned()
            .collect();

        let mut ready_sets = 0;
        let mut in_progress = false;

        for ms in &member_sets {
            let mut status = self.member_set_status(cluster, ms, store).await?;

            let previous = cluster
                .status
                .member_sets
                .get(&ms.name)
                .cloned()
                .unwrap_or_default();
            status.initialized = previous.initialized;
            status.added_to_topology = previous.added_to_topology;

            if status.status == AppState::Ready {
                ready_sets += 1;
            }

            if status.status != previous.status {
                if status.status == AppState::Ready && previous.initialized {
                    cluster.status.push_condition(ClusterCondition {
                        status: ConditionStatus::True,
                        condition_type: ClusterConditionType::MemberSetReady,
                        reason: None,
                        message: None,
                        last_transition_time: Utc::now().to_rfc3339(),
                    });
                }
                if status.status == AppState::Error {
                    cluster.status.push_condition(ClusterCondition {
                        status: ConditionStatus::True,
                        condition_type: ClusterConditionType::Error,
                        reason: Some("ErrorMemberSet".to_string()),
                        message: Some(format!("{}: {}", ms.name, status.message)),
                        last_transition_time: Utc::now().to_rfc3339(),
                    });
                }
            }

            cluster.status.member_sets.insert(ms.name.clone(), status);

            if !in_progress {
                in_progress = self
                    .upgrade_in_progress(cluster, &ms.name, store)
                    .await
                    .with_context(|| format!("check upgrade progress for {}", ms.name))?;
            }
        }

        let (state, condition_type) = decide_state(
            ready_sets,
            member_sets.len(),
            phase,
            cluster.status.last_condition_type(),
        );
        cluster.status.state = state;
        cluster.status.push_condition(ClusterCondition {
            status: ConditionStatus::True,
            condition_type,
            reason: None,
            message: None,
            last_transition_time: Utc::now().to_rfc3339(),
        });

        // a rolling update must not be reported as Error nor as Ready; only
        // the summary field is overridden, the recorded condition stays
        if in_progress {
            cluster.status.state = AppState::Init;
        }

        cluster.status.observed_generation = cluster.metadata.generation.unwrap_or_default();

        match self.connection_endpoint(cluster, store).await {
            Ok(host) => cluster.status.host = host,
            Err(err) => error!(
                "get connection endpoint for {}: {err:#}",
                cluster.metadata.name
            ),
        }

        self.write_status(cluster, store).await
    }

    /// Health of one member set derived from its pods.
    async fn member_set_status(
        &self,
        cluster: &ShardCluster,
        ms: &MemberSetSpec,
        store: &dyn ClusterStore,
    ) -> Result<MemberSetStatus> {
        let selector = member_set_labels(cluster, &ms.name);
        let pods = store
            .list_pods(&selector)
            .await
            .with_context(|| format!("list pods for member set {}", ms.name))?;

        let mut status = MemberSetStatus {
            size: ms.size,
            status: AppState::Init,
            ..Default::default()
        };
        let mut unschedulable: Option<String> = None;

        for pod in &pods {
            for cond in &pod.status.conditions {
                match cond.condition_type {
                    PodConditionType::ContainersReady => match cond.status {
                        ConditionStatus::True => status.ready += 1,
                        ConditionStatus::False => {
                            for cntr in &pod.status.container_statuses {
                                if let Some(waiting) = &cntr.state.waiting
                                    && !waiting.message.is_empty()
                                {
                                    status.message +=
                                        &format!("{}: {}; ", cntr.name, waiting.message);
                                }
                            }
                        }
                        ConditionStatus::Unknown => {}
                    },
                    PodConditionType::PodScheduled => {
                        if cond.reason.as_deref() == Some("Unschedulable")
                            && pending_longer_than(cond, Duration::minutes(1))
                        {
                            unschedulable = Some(cond.message.clone().unwrap_or_default());
                        }
                    }
                    _ => {}
                }
            }
        }

        if status.ready == status.size {
            status.status = AppState::Ready;
        }

        // a pod stuck unschedulable wins over everything else this cycle
        if let Some(message) = unschedulable {
            status.status = AppState::Error;
            status.message = message;
        }

        Ok(status)
    }

    /// Whether the member set's StatefulSet still has replicas on the old
    /// revision. A failed lookup is an error, never "no rollout".
    async fn upgrade_in_progress(
        &self,
        cluster: &ShardCluster,
        ms_name: &str,
        store: &dyn ClusterStore,
    ) -> Result<bool> {
        let sts = store
            .get_stateful_set(&format!("{}-{}", cluster.metadata.name, ms_name))
            .await?;
        Ok(sts.status.replicas > sts.status.updated_replicas)
    }

    /// Resolve the address clients should connect to, by exposure precedence.
    pub async fn connection_endpoint(
        &self,
        cluster: &ShardCluster,
        store: &dyn ClusterStore,
    ) -> Result<String> {
        let name = &cluster.metadata.name;
        let namespace = &cluster.metadata.namespace;
        let suffix = &cluster.spec.cluster_service_dns_suffix;

        if cluster.spec.sharding.enabled {
            let router = &cluster.spec.sharding.router;
            if router.expose.enabled && router.expose.expose_type == "LoadBalancer" {
                return load_balancer_endpoint(store, &format!("{name}-router")).await;
            }
            return Ok(format!("{name}-router.{namespace}.{suffix}"));
        }

        let Some(primary) = cluster.spec.member_sets.first() else {
            bail!("cluster {name} has no member sets");
        };

        if primary.expose.enabled && primary.expose.expose_type == "LoadBalancer" {
            let selector = member_set_labels(cluster, &primary.name);
            let pods = store
                .list_pods(&selector)
                .await
                .with_context(|| format!("list pods for member set {}", primary.name))?;
            let addrs = self.member_set_addrs(cluster, &pods, store).await?;
            return Ok(addrs.join(","));
        }

        Ok(format!("{name}-{}.{namespace}.{suffix}", primary.name))
    }

    /// External address of every pod in an exposed member set.
    async fn member_set_addrs(
        &self,
        cluster: &ShardCluster,
        pods: &[PodTask],
        store: &dyn ClusterStore,
    ) -> Result<Vec<String>> {
        let port = cluster.spec.port;
        let mut addrs = Vec::with_capacity(pods.len());
        for pod in pods {
            let host = self
                .pod_addr(pod, store)
                .await
                .with_context(|| format!("resolve address for pod {}", pod.metadata.name))?;
            addrs.push(format!("{host}:{port}"));
        }
        Ok(addrs)
    }

    /// Reachable host of one pod, resolved through its per-pod service.
    async fn pod_addr(&self, pod: &PodTask, store: &dyn ClusterStore) -> Result<String> {
        let service = store.get_service(&pod.metadata.name).await?;

        if service.spec.service_type == "LoadBalancer" {
            for ingress in &service.status.load_balancer.ingress {
                if !ingress.hostname.is_empty() {
                    return Ok(ingress.hostname.clone());
                }
                if !ingress.ip.is_empty() {
                    return Ok(ingress.ip.clone());
                }
            }
            bail!("load balancer for pod {} has no ingress yet", pod.metadata.name);
        }

        // headless per-pod services answer with the pod address itself
        match service.spec.cluster_ip.as_deref() {
            Some("None") | None => pod
                .status
                .pod_ip
                .clone()
                .ok_or_else(|| anyhow::anyhow!("pod {} has no address yet", pod.metadata.name)),
            Some(ip) => Ok(ip.to_string()),
        }
    }

    /// Persist the status, preferring the status subresource and falling back
    /// to a full-object update for backends that reject it. Safe to call
    /// repeatedly.
    async fn write_status(&self, cluster: &ShardCluster, store: &dyn ClusterStore) -> Result<()> {
        if let Err(err) = store.update_status(cluster).await {
            info!(
                "status update for {} falling back to full object: {err:#}",
                cluster.metadata.name
            );
            store
                .update_cluster(cluster)
                .await
                .context("send update")?;
        }
        Ok(())
    }

    /// Approximate the cycle intent from the workload objects: settled once
    /// every member set's StatefulSet exists at its desired size. The real
    /// signal belongs to the workload subsystem; the status core only takes
    /// the phase as a parameter.
    async fn desired_phase(
        &self,
        cluster: &ShardCluster,
        store: &dyn ClusterStore,
    ) -> Result<DesiredPhase> {
        for ms in cluster.spec.member_sets_with_config() {
            let sts_name = format!("{}-{}", cluster.metadata.name, ms.name);
            match store.get_stateful_set(&sts_name).await {
                Ok(sts) if sts.spec.replicas == ms.size => {}
                Ok(_) => return Ok(DesiredPhase::Initializing),
                Err(err) if is_not_found(&err) => return Ok(DesiredPhase::Initializing),
                Err(err) => {
                    return Err(err).with_context(|| format!("get statefulset {sts_name}"));
                }
            }
        }
        Ok(DesiredPhase::Settled)
    }
}

impl Default for StatusController {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Controller for StatusController {
    fn name(&self) -> &'static str {
        "status"
    }

    async fn reconcile(&self, key: &str, store: Arc<dyn ClusterStore>) -> Result<()> {
        let Some(mut cluster) = store.get_shard_cluster(key).await? else {
            info!("shard cluster {key} not found, skipping reconciliation");
            return Ok(());
        };

        match self.desired_phase(&cluster, store.as_ref()).await {
            Ok(phase) => {
                self.update_status(&mut cluster, None, phase, store.as_ref())
                    .await
            }
            Err(err) => {
                self.update_status(
                    &mut cluster,
                    Some(&err),
                    DesiredPhase::Initializing,
                    store.as_ref(),
                )
                .await?;
                Err(err)
            }
        }
    }
}

/// Overall state from group results and caller intent. Pure so it can be
/// tested apart from persistence.
fn decide_state(
    ready_sets: usize,
    total_sets: usize,
    phase: DesiredPhase,
    last_condition: Option<ClusterConditionType>,
) -> (AppState, ClusterConditionType) {
    if ready_sets == total_sets && phase == DesiredPhase::Settled {
        (AppState::Ready, ClusterConditionType::Ready)
    } else if phase == DesiredPhase::Initializing
        && last_condition != Some(ClusterConditionType::Ready)
    {
        (AppState::Init, ClusterConditionType::Init)
    } else {
        // settled but incomplete, or initializing after already Ready
        (AppState::Error, ClusterConditionType::Error)
    }
}

/// Selector for the pods of one member set.
pub fn member_set_labels(cluster: &ShardCluster, ms_name: &str) -> HashMap<String, String> {
    HashMap::from([
        (
            "app.kubernetes.io/name".to_string(),
            "shardset".to_string(),
        ),
        (
            "app.kubernetes.io/instance".to_string(),
            cluster.metadata.name.clone(),
        ),
        (
            "app.kubernetes.io/member-set".to_string(),
            ms_name.to_string(),
        ),
        (
            "app.kubernetes.io/managed-by".to_string(),
            "shardset-operator".to_string(),
        ),
        (
            "app.kubernetes.io/part-of".to_string(),
            "shardset".to_string(),
        ),
    ])
}

fn pending_longer_than(cond: &PodCondition, grace: Duration) -> bool {
    let Some(ts) = cond.last_transition_time.as_deref() else {
        return false;
    };
    match DateTime::parse_from_rfc3339(ts) {
        Ok(t) => t.with_timezone(&Utc) < Utc::now() - grace,
        Err(_) => false,
    }
}

async fn load_balancer_endpoint(store: &dyn ClusterStore, service_name: &str) -> Result<String> {
    let service = store
        .get_service(service_name)
        .await
        .with_context(|| format!("get service {service_name}"))?;

    let mut host = String::new();
    for ingress in &service.status.load_balancer.ingress {
        host = ingress.ip.clone();
        if !ingress.hostname.is_empty() {
            host = ingress.hostname.clone();
        }
    }
    Ok(host)
}

fn is_not_found(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::NotFound { .. })
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decide_all_ready_settled() {
        let (state, cond) = decide_state(3, 3, DesiredPhase::Settled, None);
        assert_eq!(state, AppState::Ready);
        assert_eq!(cond, ClusterConditionType::Ready);
    }

    #[test]
    fn test_decide_initializing_before_first_ready() {
        let (state, cond) = decide_state(
            1,
            3,
            DesiredPhase::Initializing,
            Some(ClusterConditionType::Init),
        );
        assert_eq!(state, AppState::Init);
        assert_eq!(cond, ClusterConditionType::Init);

        // empty history counts as "not Ready yet"
        let (state, _) = decide_state(0, 3, DesiredPhase::Initializing, None);
        assert_eq!(state, AppState::Init);
    }

    #[test]
    fn test_decide_settled_but_incomplete_is_error() {
        let (state, cond) = decide_state(2, 3, DesiredPhase::Settled, None);
        assert_eq!(state, AppState::Error);
        assert_eq!(cond, ClusterConditionType::Error);
    }

    #[test]
    fn test_decide_initializing_after_ready_is_error() {
        let (state, _) = decide_state(
            1,
            3,
            DesiredPhase::Initializing,
            Some(ClusterConditionType::Ready),
        );
        assert_eq!(state, AppState::Error);
    }

    #[test]
    fn test_unschedulable_grace_window() {
        let old = PodCondition {
            condition_type: PodConditionType::PodScheduled,
            status: ConditionStatus::False,
            reason: Some("Unschedulable".to_string()),
            message: Some("0/3 nodes available".to_string()),
            last_transition_time: Some((Utc::now() - Duration::minutes(5)).to_rfc3339()),
        };
        assert!(pending_longer_than(&old, Duration::minutes(1)));

        let fresh = PodCondition {
            last_transition_time: Some(Utc::now().to_rfc3339()),
            ..old.clone()
        };
        assert!(!pending_longer_than(&fresh, Duration::minutes(1)));

        let unknown = PodCondition {
            last_transition_time: None,
            ..old
        };
        assert!(!pending_longer_than(&unknown, Duration::minutes(1)));
    }
}
