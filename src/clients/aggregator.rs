use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::helpers::creation_timestamp;
use crate::models::k8s::{self, Node, NodeMetrics, Pod, PodMetrics, ResourceList};
use crate::models::overview::{
    ClusterOverview, NodeOverview, NodeReadiness, NodeRole, OverviewSnapshot, PodOverview,
    ResourceDetail, ResourceSimple,
};
use crate::quantity::{cpu_millis, memory_mib};

use super::{ClientError, Inventory, InventorySource, MetricsSource};

/// Role label keys, highest priority first.
const ROLE_LABELS: [(&str, NodeRole); 3] = [
    ("node-role.kubernetes.io/master", NodeRole::Master),
    ("node-role.kubernetes.io/control-plane", NodeRole::ControlPlane),
    ("node-role.kubernetes.io/worker", NodeRole::Worker),
];

/// Joins inventory and metrics into the overview projections. Every call
/// fetches fresh data and builds its result from scratch.
pub struct Aggregator {
    inventory: Arc<dyn InventorySource>,
    metrics: Arc<dyn MetricsSource>,
}

impl Aggregator {
    pub fn new(inventory: Arc<dyn InventorySource>, metrics: Arc<dyn MetricsSource>) -> Self {
        Self { inventory, metrics }
    }

    /// Best effort: an unreachable version endpoint leaves the field empty.
    async fn server_version(&self) -> String {
        match self.inventory.server_version().await {
            Ok(v) => v,
            Err(e) => {
                warn!("server version unavailable: {}", e);
                String::new()
            }
        }
    }

    pub async fn cluster_overview(&self) -> Result<ClusterOverview, ClientError> {
        let Inventory { nodes, pods } = Inventory::fetch(self.inventory.as_ref()).await?;
        let namespaces = self.inventory.list_namespaces().await?;
        let node_metrics = self.metrics.list_node_metrics().await?;
        let version = self.server_version().await;

        Ok(build_cluster_overview(
            &nodes,
            &pods,
            namespaces.len(),
            &node_metrics,
            version,
        ))
    }

    pub async fn node_overview(&self) -> Result<Vec<NodeOverview>, ClientError> {
        let Inventory { nodes, pods } = Inventory::fetch(self.inventory.as_ref()).await?;
        let node_metrics = self.metrics.list_node_metrics().await?;
        Ok(build_node_overviews(&nodes, &pods, &node_metrics))
    }

    pub async fn pod_overview(&self) -> Result<Vec<PodOverview>, ClientError> {
        let Inventory { nodes, pods } = Inventory::fetch(self.inventory.as_ref()).await?;
        let pod_metrics = self.metrics.list_pod_metrics().await?;
        Ok(build_pod_overviews(&nodes, &pods, &pod_metrics))
    }

    /// All three projections built from one inventory and one metrics sample,
    /// so node pod counts always agree with the pod list. The first failure
    /// aborts the whole snapshot; there is no partial result.
    pub async fn snapshot(&self) -> Result<OverviewSnapshot, ClientError> {
        let (Inventory { nodes, pods }, namespaces, node_metrics, pod_metrics, version) = tokio::try_join!(
            Inventory::fetch(self.inventory.as_ref()),
            self.inventory.list_namespaces(),
            self.metrics.list_node_metrics(),
            self.metrics.list_pod_metrics(),
            async { Ok::<_, ClientError>(self.server_version().await) },
        )?;

        let snapshot = OverviewSnapshot {
            cluster: build_cluster_overview(&nodes, &pods, namespaces.len(), &node_metrics, version),
            nodes: build_node_overviews(&nodes, &pods, &node_metrics),
            pods: build_pod_overviews(&nodes, &pods, &pod_metrics),
        };
        debug!(
            "snapshot built: {} nodes, {} pods",
            snapshot.nodes.len(),
            snapshot.pods.len()
        );
        Ok(snapshot)
    }
}

fn cpu_of(list: Option<&ResourceList>) -> i64 {
    cpu_millis(list.and_then(|l| l.get("cpu")))
}

fn memory_of(list: Option<&ResourceList>) -> i64 {
    memory_mib(list.and_then(|l| l.get("memory")))
}

fn add(total: &mut i64, v: i64) {
    *total = total.saturating_add(v);
}

fn capacity(node: &Node) -> Option<&ResourceList> {
    node.status.as_ref()?.capacity.as_ref()
}

fn allocatable(node: &Node) -> Option<&ResourceList> {
    node.status.as_ref()?.allocatable.as_ref()
}

/// Empty for pods the scheduler has not placed yet.
fn assigned_node(pod: &Pod) -> &str {
    pod.spec
        .as_ref()
        .and_then(|s| s.node_name.as_deref())
        .unwrap_or_default()
}

/// Summed container requests and limits for one pod, as (cpu, memory) with zero usage.
fn pod_requests(pod: &Pod) -> (ResourceSimple, ResourceSimple) {
    let mut cpu = ResourceSimple::default();
    let mut memory = ResourceSimple::default();
    for c in pod.spec.iter().flat_map(|s| &s.containers) {
        let requests = c.resources.as_ref().and_then(|r| r.requests.as_ref());
        let limits = c.resources.as_ref().and_then(|r| r.limits.as_ref());
        add(&mut cpu.requests, cpu_of(requests));
        add(&mut cpu.limits, cpu_of(limits));
        add(&mut memory.requests, memory_of(requests));
        add(&mut memory.limits, memory_of(limits));
    }
    (cpu, memory)
}

/// The first `Ready` condition decides; a node without one is `Unknown`.
pub fn node_readiness(node: &Node) -> NodeReadiness {
    node.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .and_then(|conditions| conditions.iter().find(|c| c.type_ == "Ready"))
        .map(|c| {
            if c.status == "True" {
                NodeReadiness::Ready
            } else {
                NodeReadiness::NotReady
            }
        })
        .unwrap_or(NodeReadiness::Unknown)
}

pub fn node_role(node: &Node) -> NodeRole {
    node.metadata
        .labels
        .as_ref()
        .and_then(|labels| {
            ROLE_LABELS
                .iter()
                .find(|(key, _)| labels.contains_key(*key))
                .map(|(_, role)| *role)
        })
        .unwrap_or_default()
}

pub fn build_cluster_overview(
    nodes: &[Node],
    pods: &[Pod],
    namespace_count: usize,
    node_metrics: &[NodeMetrics],
    kubernetes_version: String,
) -> ClusterOverview {
    let mut overview = ClusterOverview {
        node_count: nodes.len(),
        pod_count: pods.len(),
        namespace_count,
        kubernetes_version,
        ..Default::default()
    };

    for node in nodes {
        match node_readiness(node) {
            NodeReadiness::Ready => overview.ready_node_count += 1,
            NodeReadiness::NotReady => overview.not_ready_node_count += 1,
            NodeReadiness::Unknown => {}
        }

        add(&mut overview.cpu.allocatable, cpu_of(allocatable(node)));
        add(&mut overview.cpu.capacity, cpu_of(capacity(node)));
        add(&mut overview.memory.allocatable, memory_of(allocatable(node)));
        add(&mut overview.memory.capacity, memory_of(capacity(node)));
    }

    for m in node_metrics {
        add(&mut overview.cpu.usage, cpu_of(Some(&m.usage)));
        add(&mut overview.memory.usage, memory_of(Some(&m.usage)));
    }

    for pod in pods {
        let (cpu, memory) = pod_requests(pod);
        add(&mut overview.cpu.requests, cpu.requests);
        add(&mut overview.cpu.limits, cpu.limits);
        add(&mut overview.memory.requests, memory.requests);
        add(&mut overview.memory.limits, memory.limits);
    }

    overview
}

pub fn build_node_overviews(
    nodes: &[Node],
    pods: &[Pod],
    node_metrics: &[NodeMetrics],
) -> Vec<NodeOverview> {
    let usage: HashMap<&str, (i64, i64)> = node_metrics
        .iter()
        .map(|m| {
            (
                k8s::name(&m.metadata),
                (cpu_of(Some(&m.usage)), memory_of(Some(&m.usage))),
            )
        })
        .collect();

    nodes
        .iter()
        .map(|node| {
            let name = k8s::name(&node.metadata);
            let (cpu_usage, memory_usage) = usage.get(name).copied().unwrap_or_default();

            let mut cpu = ResourceDetail {
                usage: cpu_usage,
                allocatable: cpu_of(allocatable(node)),
                capacity: cpu_of(capacity(node)),
                ..Default::default()
            };
            let mut memory = ResourceDetail {
                usage: memory_usage,
                allocatable: memory_of(allocatable(node)),
                capacity: memory_of(capacity(node)),
                ..Default::default()
            };

            // Full pod scan per node; index pods by node name first if this
            // ever has to serve clusters with many thousands of nodes.
            let mut pod_count = 0;
            for pod in pods.iter().filter(|p| assigned_node(p) == name) {
                pod_count += 1;
                let (pod_cpu, pod_memory) = pod_requests(pod);
                add(&mut cpu.requests, pod_cpu.requests);
                add(&mut cpu.limits, pod_cpu.limits);
                add(&mut memory.requests, pod_memory.requests);
                add(&mut memory.limits, pod_memory.limits);
            }

            NodeOverview {
                name: name.to_string(),
                cpu,
                memory,
                status: node_readiness(node),
                pod_count,
                role: node_role(node),
                creation_timestamp: creation_timestamp(&node.metadata),
            }
        })
        .collect()
}

pub fn build_pod_overviews(
    nodes: &[Node],
    pods: &[Pod],
    pod_metrics: &[PodMetrics],
) -> Vec<PodOverview> {
    let capacities: HashMap<&str, (i64, i64)> = nodes
        .iter()
        .map(|n| {
            (
                k8s::name(&n.metadata),
                (cpu_of(capacity(n)), memory_of(capacity(n))),
            )
        })
        .collect();

    let usage: HashMap<(&str, &str), (i64, i64)> = pod_metrics
        .iter()
        .map(|m| {
            let totals = m.containers.iter().fold((0i64, 0i64), |(cpu, mem), c| {
                (
                    cpu.saturating_add(cpu_of(Some(&c.usage))),
                    mem.saturating_add(memory_of(Some(&c.usage))),
                )
            });
            ((k8s::namespace(&m.metadata), k8s::name(&m.metadata)), totals)
        })
        .collect();

    pods.iter()
        .map(|pod| {
            let namespace = k8s::namespace(&pod.metadata);
            let name = k8s::name(&pod.metadata);
            let node = assigned_node(pod);

            let (mut cpu, mut memory) = pod_requests(pod);
            let (cpu_usage, memory_usage) =
                usage.get(&(namespace, name)).copied().unwrap_or_default();
            cpu.usage = cpu_usage;
            memory.usage = memory_usage;

            let (node_cpu_capacity, node_memory_capacity) = if node.is_empty() {
                (0, 0)
            } else {
                capacities.get(node).copied().unwrap_or_default()
            };

            PodOverview {
                namespace: namespace.to_string(),
                name: name.to_string(),
                node: node.to_string(),
                cpu,
                memory,
                node_cpu_capacity,
                node_memory_capacity,
            }
        })
        .collect()
}
