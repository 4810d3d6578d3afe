use serde::Serialize;

/// One resource kind for a node or the whole cluster, in milli-cores or MiB.
/// Missing source values are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResourceDetail {
    pub usage: i64,
    pub requests: i64,
    pub limits: i64,
    pub allocatable: i64,
    pub capacity: i64,
}

/// Per-pod resource figures. A pod has no allocatable or capacity of its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResourceSimple {
    pub usage: i64,
    pub requests: i64,
    pub limits: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterOverview {
    pub cpu: ResourceDetail,
    pub memory: ResourceDetail,
    pub node_count: usize,
    pub ready_node_count: usize,
    pub not_ready_node_count: usize,
    pub pod_count: usize,
    pub namespace_count: usize,
    pub kubernetes_version: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum NodeReadiness {
    Ready,
    NotReady,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeRole {
    Master,
    ControlPlane,
    #[default]
    Worker,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeOverview {
    pub name: String,
    pub cpu: ResourceDetail,
    pub memory: ResourceDetail,
    pub status: NodeReadiness,
    pub pod_count: usize,
    pub role: NodeRole,
    pub creation_timestamp: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodOverview {
    pub namespace: String,
    pub name: String,
    /// Assigned node name, empty when unscheduled.
    pub node: String,
    pub cpu: ResourceSimple,
    pub memory: ResourceSimple,
    pub node_cpu_capacity: i64,
    pub node_memory_capacity: i64,
}

/// All three projections from one aggregation cycle, as pushed on the stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OverviewSnapshot {
    pub cluster: ClusterOverview,
    pub nodes: Vec<NodeOverview>,
    pub pods: Vec<PodOverview>,
}
