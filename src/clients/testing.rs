//! In-memory inventory and metrics sources plus fixture builders for tests.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{
    Container, NodeCondition, NodeStatus, PodSpec, ResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{ClientError, InventorySource, MetricsSource};
use crate::models::k8s::{
    ContainerMetrics, Namespace, Node, NodeMetrics, Pod, PodMetrics, ResourceList,
};

fn unavailable(path: &str) -> ClientError {
    ClientError::Api {
        path: path.to_string(),
        source: kube::Error::Service("503 service unavailable".into()),
    }
}

fn fails_at(from: Option<usize>, call: usize) -> bool {
    from.is_some_and(|from| call >= from)
}

#[derive(Default)]
pub struct FakeCluster {
    pub nodes: Vec<Node>,
    pub pods: Vec<Pod>,
    pub namespaces: Vec<Namespace>,
    pub node_metrics: Vec<NodeMetrics>,
    pub pod_metrics: Vec<PodMetrics>,
    /// `None` makes the version lookup fail.
    pub version: Option<String>,
    pub fail_nodes: bool,
    pub fail_namespaces: bool,
    /// Node metrics listing fails from this call number (1-based) onwards.
    pub fail_node_metrics_from: Option<usize>,
    /// Pod metrics listing fails from this call number (1-based) onwards.
    pub fail_pod_metrics_from: Option<usize>,
    /// Every pod listing returns one more pod on the first node than the last.
    pub churn_pods: bool,
    /// Applied to every call, to simulate slow upstreams.
    pub latency: Option<Duration>,
    pub(crate) calls: AtomicUsize,
    pub(crate) pod_calls: AtomicUsize,
    pub(crate) node_metrics_calls: AtomicUsize,
    pub(crate) pod_metrics_calls: AtomicUsize,
}

impl FakeCluster {
    /// Total number of upstream calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn pod_calls(&self) -> usize {
        self.pod_calls.load(Ordering::SeqCst)
    }

    pub fn pod_metrics_calls(&self) -> usize {
        self.pod_metrics_calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl InventorySource for FakeCluster {
    async fn list_nodes(&self) -> Result<Vec<Node>, ClientError> {
        self.enter().await;
        if self.fail_nodes {
            return Err(unavailable("/api/v1/nodes"));
        }
        Ok(self.nodes.clone())
    }

    async fn list_pods(&self) -> Result<Vec<Pod>, ClientError> {
        self.enter().await;
        let n = self.pod_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let mut pods = self.pods.clone();
        if self.churn_pods {
            let target = self.nodes.first().map(|n| crate::models::k8s::name(&n.metadata));
            for i in 0..n {
                pods.push(pod("churn", &format!("p{i}"), target.unwrap_or(""), &[]));
            }
        }
        Ok(pods)
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>, ClientError> {
        self.enter().await;
        if self.fail_namespaces {
            return Err(unavailable("/api/v1/namespaces"));
        }
        Ok(self.namespaces.clone())
    }

    async fn server_version(&self) -> Result<String, ClientError> {
        self.enter().await;
        self.version.clone().ok_or_else(|| unavailable("/version"))
    }
}

#[async_trait]
impl MetricsSource for FakeCluster {
    async fn list_node_metrics(&self) -> Result<Vec<NodeMetrics>, ClientError> {
        self.enter().await;
        let n = self.node_metrics_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if fails_at(self.fail_node_metrics_from, n) {
            return Err(unavailable("/apis/metrics.k8s.io/v1beta1/nodes"));
        }
        Ok(self.node_metrics.clone())
    }

    async fn list_pod_metrics(&self) -> Result<Vec<PodMetrics>, ClientError> {
        self.enter().await;
        let n = self.pod_metrics_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if fails_at(self.fail_pod_metrics_from, n) {
            return Err(unavailable("/apis/metrics.k8s.io/v1beta1/pods"));
        }
        Ok(self.pod_metrics.clone())
    }
}

fn meta(namespace: &str, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: (!namespace.is_empty()).then(|| namespace.to_string()),
        ..Default::default()
    }
}

pub fn resources(cpu: &str, memory: &str) -> ResourceList {
    ResourceList::from([
        ("cpu".to_string(), Quantity(cpu.to_string())),
        ("memory".to_string(), Quantity(memory.to_string())),
    ])
}

fn condition(kind: &str, status: &str) -> NodeCondition {
    NodeCondition {
        type_: kind.to_string(),
        status: status.to_string(),
        ..Default::default()
    }
}

/// A Ready node with the given capacity and allocatable figures.
pub fn node(name: &str, capacity: (&str, &str), allocatable: (&str, &str)) -> Node {
    Node {
        metadata: meta("", name),
        status: Some(NodeStatus {
            conditions: Some(vec![condition("Ready", "True")]),
            capacity: Some(resources(capacity.0, capacity.1)),
            allocatable: Some(resources(allocatable.0, allocatable.1)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn with_labels(mut node: Node, labels: &[&str]) -> Node {
    node.metadata.labels = Some(
        labels
            .iter()
            .map(|l| (l.to_string(), String::new()))
            .collect(),
    );
    node
}

pub fn with_conditions(mut node: Node, conditions: &[(&str, &str)]) -> Node {
    node.status.get_or_insert_with(Default::default).conditions =
        Some(conditions.iter().map(|(t, s)| condition(t, s)).collect());
    node
}

/// A pod whose containers each carry `(requests, limits)` as `((cpu, mem), (cpu, mem))`.
pub fn pod(namespace: &str, name: &str, node: &str, containers: &[((&str, &str), (&str, &str))]) -> Pod {
    Pod {
        metadata: meta(namespace, name),
        spec: Some(PodSpec {
            node_name: (!node.is_empty()).then(|| node.to_string()),
            containers: containers
                .iter()
                .enumerate()
                .map(|(i, (req, lim))| Container {
                    name: format!("c{i}"),
                    resources: Some(ResourceRequirements {
                        requests: Some(resources(req.0, req.1)),
                        limits: Some(resources(lim.0, lim.1)),
                        ..Default::default()
                    }),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn namespace(name: &str) -> Namespace {
    Namespace {
        metadata: meta("", name),
        ..Default::default()
    }
}

pub fn node_metrics(name: &str, cpu: &str, memory: &str) -> NodeMetrics {
    NodeMetrics {
        metadata: meta("", name),
        usage: resources(cpu, memory),
    }
}

pub fn pod_metrics(namespace: &str, name: &str, containers: &[(&str, &str)]) -> PodMetrics {
    PodMetrics {
        metadata: meta(namespace, name),
        containers: containers
            .iter()
            .enumerate()
            .map(|(i, (cpu, mem))| ContainerMetrics {
                name: format!("c{i}"),
                usage: resources(cpu, mem),
            })
            .collect(),
    }
}

/// Two nodes and a pod on the first: node-a has no metrics entry, node-b reports 500m.
pub fn two_node_cluster() -> FakeCluster {
    FakeCluster {
        nodes: vec![
            node("node-a", ("4", "8Gi"), ("3800m", "7Gi")),
            node("node-b", ("2000m", "4Gi"), ("1900m", "3Gi")),
        ],
        pods: vec![pod(
            "default",
            "web-0",
            "node-a",
            &[(("100m", "64Mi"), ("200m", "128Mi"))],
        )],
        namespaces: vec![namespace("default"), namespace("kube-system")],
        node_metrics: vec![node_metrics("node-b", "500m", "1Gi")],
        pod_metrics: vec![pod_metrics("default", "web-0", &[("30m", "40Mi")])],
        version: Some("v1.30.2".to_string()),
        ..Default::default()
    }
}
