use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::{ConditionStatus, ObjectMeta};

/// Conditions kept in a cluster status before the oldest are discarded.
pub const MAX_CONDITIONS: usize = 20;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ShardCluster {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    #[serde(rename = "kind")]
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: ShardClusterSpec,
    #[serde(default)]
    pub status: ClusterStatus,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ShardClusterSpec {
    #[serde(rename = "memberSets", default)]
    pub member_sets: Vec<MemberSetSpec>,
    #[serde(default)]
    pub sharding: ShardingSpec,
    #[serde(rename = "clusterServiceDNSSuffix", default = "default_dns_suffix")]
    pub cluster_service_dns_suffix: String,
    #[serde(default = "default_port")]
    pub port: i32,
}

impl Default for ShardClusterSpec {
    fn default() -> Self {
        Self {
            member_sets: Vec::new(),
            sharding: ShardingSpec::default(),
            cluster_service_dns_suffix: default_dns_suffix(),
            port: default_port(),
        }
    }
}

fn default_dns_suffix() -> String {
    "svc.cluster.local".to_string()
}

fn default_port() -> i32 {
    7677
}

impl ShardClusterSpec {
    /// Member sets in evaluation order: the data-bearing sets first, then the
    /// config-server set when sharding is on.
    pub fn member_sets_with_config(&self) -> Vec<&MemberSetSpec> {
        let mut sets: Vec<&MemberSetSpec> = self.member_sets.iter().collect();
        if self.sharding.enabled
            && let Some(cfg) = &self.sharding.config_server
        {
            sets.push(cfg);
        }
        sets
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MemberSetSpec {
    pub name: String,
    pub size: i32,
    #[serde(default)]
    pub expose: ExposeSpec,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExposeSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(rename = "exposeType", default = "default_expose_type")]
    pub expose_type: String, // ClusterIP, NodePort, LoadBalancer
}

fn default_expose_type() -> String {
    "ClusterIP".to_string()
}

impl Default for ExposeSpec {
    fn default() -> Self {
        Self {
            enabled: false,
            expose_type: default_expose_type(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ShardingSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub router: RouterSpec,
    #[serde(rename = "configServer", default)]
    pub config_server: Option<MemberSetSpec>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RouterSpec {
    #[serde(default)]
    pub expose: ExposeSpec,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum AppState {
    #[default]
    Init,
    Ready,
    Error,
}

/// Per member set health, keyed by set name in the cluster status.
/// `initialized` and `added_to_topology` are maintained by the topology
/// subsystem and are only carried forward here, never recomputed.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct MemberSetStatus {
    #[serde(default)]
    pub size: i32,
    #[serde(default)]
    pub ready: i32,
    #[serde(default)]
    pub status: AppState,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub initialized: bool,
    #[serde(rename = "addedToTopology", default)]
    pub added_to_topology: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum ClusterConditionType {
    Init,
    MemberSetReady,
    Ready,
    Error,
}

/// Timestamped record of a state transition. Immutable once appended.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClusterCondition {
    pub status: ConditionStatus,
    #[serde(rename = "type")]
    pub condition_type: ClusterConditionType,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "lastTransitionTime")]
    pub last_transition_time: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ClusterStatus {
    #[serde(default)]
    pub state: AppState,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub host: String,
    #[serde(rename = "observedGeneration", default)]
    pub observed_generation: i64,
    #[serde(default)]
    pub conditions: VecDeque<ClusterCondition>,
    #[serde(rename = "memberSets", default)]
    pub member_sets: HashMap<String, MemberSetStatus>,
}

impl ClusterStatus {
    /// Append a condition unless the tail already has the same type, then trim
    /// the history to the most recent `MAX_CONDITIONS` entries. Repeated errors
    /// with changing messages do not grow the log.
    pub fn push_condition(&mut self, condition: ClusterCondition) {
        if let Some(last) = self.conditions.back()
            && last.condition_type == condition.condition_type
        {
            return;
        }
        self.conditions.push_back(condition);
        while self.conditions.len() > MAX_CONDITIONS {
            self.conditions.pop_front();
        }
    }

    pub fn last_condition_type(&self) -> Option<ClusterConditionType> {
        self.conditions.back().map(|c| c.condition_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn condition(condition_type: ClusterConditionType, message: &str) -> ClusterCondition {
        ClusterCondition {
            status: ConditionStatus::True,
            condition_type,
            reason: None,
            message: Some(message.to_string()),
            last_transition_time: "2026-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_first_condition_always_accepted() {
        let mut status = ClusterStatus::default();
        status.push_condition(condition(ClusterConditionType::Init, "first"));
        assert_eq!(status.conditions.len(), 1);
        assert_eq!(status.last_condition_type(), Some(ClusterConditionType::Init));
    }

    #[test]
    fn test_adjacent_same_type_is_dropped() {
        let mut status = ClusterStatus::default();
        status.push_condition(condition(ClusterConditionType::Error, "disk full"));
        status.push_condition(condition(ClusterConditionType::Error, "disk still full"));
        status.push_condition(condition(ClusterConditionType::Error, "another message"));

        assert_eq!(status.conditions.len(), 1);
        // the original entry survives, the later candidates are dropped
        assert_eq!(status.conditions[0].message.as_deref(), Some("disk full"));
    }

    #[test]
    fn test_alternating_types_all_append() {
        let mut status = ClusterStatus::default();
        status.push_condition(condition(ClusterConditionType::Init, ""));
        status.push_condition(condition(ClusterConditionType::Ready, ""));
        status.push_condition(condition(ClusterConditionType::Init, ""));
        assert_eq!(status.conditions.len(), 3);
    }

    #[test]
    fn test_history_trimmed_to_cap_oldest_first() {
        let mut status = ClusterStatus::default();
        for i in 0..25 {
            let ty = if i % 2 == 0 {
                ClusterConditionType::Init
            } else {
                ClusterConditionType::Error
            };
            status.push_condition(condition(ty, &format!("c{i}")));
        }

        assert_eq!(status.conditions.len(), MAX_CONDITIONS);
        // the first five entries were discarded, order of the rest preserved
        assert_eq!(status.conditions[0].message.as_deref(), Some("c5"));
        assert_eq!(status.conditions[19].message.as_deref(), Some("c24"));
        let history: Vec<_> = status.conditions.iter().collect();
        for pair in history.windows(2) {
            assert_ne!(pair[0].condition_type, pair[1].condition_type);
        }
    }

    #[test]
    fn test_member_sets_with_config_order() {
        let spec = ShardClusterSpec {
            member_sets: vec![
                MemberSetSpec {
                    name: "shard0".to_string(),
                    size: 3,
                    expose: ExposeSpec::default(),
                },
                MemberSetSpec {
                    name: "shard1".to_string(),
                    size: 3,
                    expose: ExposeSpec::default(),
                },
            ],
            sharding: ShardingSpec {
                enabled: true,
                router: RouterSpec::default(),
                config_server: Some(MemberSetSpec {
                    name: "cfg".to_string(),
                    size: 3,
                    expose: ExposeSpec::default(),
                }),
            },
            ..Default::default()
        };

        let names: Vec<&str> = spec
            .member_sets_with_config()
            .iter()
            .map(|ms| ms.name.as_str())
            .collect();
        assert_eq!(names, vec!["shard0", "shard1", "cfg"]);

        // config server only counts while sharding is on
        let mut unsharded = spec.clone();
        unsharded.sharding.enabled = false;
        assert_eq!(unsharded.member_sets_with_config().len(), 2);
    }
}
