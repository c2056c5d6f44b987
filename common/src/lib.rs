use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod cluster;

pub use cluster::*;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    #[serde(default)]
    pub generation: Option<i64>,
}

fn default_namespace() -> String {
    "default".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PodTask {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    #[serde(rename = "kind")]
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: PodSpec,
    #[serde(default)]
    pub status: PodStatus,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct PodSpec {
    //if pod is distributed to a node ,then this field should be filled with node-id
    #[serde(default)]
    pub node_name: Option<String>,
    #[serde(default)]
    pub containers: Vec<ContainerSpec>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct PodStatus {
    #[serde(rename = "podIP")]
    pub pod_ip: Option<String>,
    #[serde(default)]
    pub conditions: Vec<PodCondition>,
    #[serde(rename = "containerStatuses", default)]
    pub container_statuses: Vec<ContainerStatus>,
}

/// Pod condition entry
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PodCondition {
    #[serde(rename = "type")]
    pub condition_type: PodConditionType, // e.g., "ContainersReady", "PodScheduled"
    pub status: ConditionStatus, // "True" | "False" | "Unknown"
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "lastTransitionTime", default)]
    pub last_transition_time: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum PodConditionType {
    Ready,
    ContainersReady,
    PodScheduled,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ContainerStatus {
    pub name: String,
    #[serde(default)]
    pub state: ContainerState,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ContainerState {
    #[serde(default)]
    pub waiting: Option<ContainerStateWaiting>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ContainerStateWaiting {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServiceTask {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    #[serde(rename = "kind")]
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: ServiceSpec,
    #[serde(default)]
    pub status: ServiceStatus,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServiceSpec {
    #[serde(rename = "type", default = "default_service_type")]
    pub service_type: String, // ClusterIP, NodePort, LoadBalancer
    #[serde(default)]
    pub selector: HashMap<String, String>,
    #[serde(default)]
    pub ports: Vec<ServicePort>,
    #[serde(rename = "clusterIP", default)]
    pub cluster_ip: Option<String>,
}

fn default_service_type() -> String {
    "ClusterIP".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServicePort {
    #[serde(rename = "port")]
    pub port: i32,
    #[serde(rename = "targetPort", default)]
    pub target_port: Option<i32>,
    #[serde(rename = "protocol", default = "default_protocol")]
    pub protocol: String, // TCP/UDP
}

fn default_protocol() -> String {
    "TCP".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ServiceStatus {
    #[serde(rename = "loadBalancer", default)]
    pub load_balancer: LoadBalancerStatus,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct LoadBalancerStatus {
    #[serde(default)]
    pub ingress: Vec<LoadBalancerIngress>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct LoadBalancerIngress {
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub hostname: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StatefulSet {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    #[serde(rename = "kind")]
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: StatefulSetSpec,
    #[serde(default)]
    pub status: StatefulSetStatus,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StatefulSetSpec {
    #[serde(default)]
    pub replicas: i32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StatefulSetStatus {
    #[serde(default)]
    pub replicas: i32,
    #[serde(rename = "updatedReplicas", default)]
    pub updated_replicas: i32,
}
