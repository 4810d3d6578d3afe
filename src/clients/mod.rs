pub mod aggregator;
pub mod broadcaster;
#[cfg(test)]
pub mod testing;

use async_trait::async_trait;
use kube::api::{Api, ListParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use thiserror::Error;
use tracing::debug;

use crate::models::k8s::{MetricsList, Namespace, Node, NodeMetrics, Pod, PodMetrics};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("creating Kubernetes client: {0}")]
    Build(#[source] kube::Error),
    #[error("building request for {path}: {source}")]
    Request {
        path: String,
        #[source]
        source: http::Error,
    },
    #[error("GET {path} failed: {source}")]
    Api {
        path: String,
        #[source]
        source: kube::Error,
    },
}

/// Point-in-time listings from the cluster inventory API.
#[async_trait]
pub trait InventorySource: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<Node>, ClientError>;
    async fn list_pods(&self) -> Result<Vec<Pod>, ClientError>;
    async fn list_namespaces(&self) -> Result<Vec<Namespace>, ClientError>;
    /// The API server's `gitVersion`, e.g. `v1.30.2`.
    async fn server_version(&self) -> Result<String, ClientError>;
}

/// Point-in-time usage samples from the metrics API. Entries may be missing
/// for resources that were just created or are terminating.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn list_node_metrics(&self) -> Result<Vec<NodeMetrics>, ClientError>;
    async fn list_pod_metrics(&self) -> Result<Vec<PodMetrics>, ClientError>;
}

/// Nodes and pods fetched back to back and treated as one snapshot.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub nodes: Vec<Node>,
    pub pods: Vec<Pod>,
}

impl Inventory {
    pub async fn fetch(source: &dyn InventorySource) -> Result<Self, ClientError> {
        let nodes = source.list_nodes().await?;
        let pods = source.list_pods().await?;
        Ok(Self { nodes, pods })
    }
}

const NODES_PATH: &str = "/api/v1/nodes";
const PODS_PATH: &str = "/api/v1/pods";
const NAMESPACES_PATH: &str = "/api/v1/namespaces";
const VERSION_PATH: &str = "/version";
const NODE_METRICS_PATH: &str = "/apis/metrics.k8s.io/v1beta1/nodes";
const POD_METRICS_PATH: &str = "/apis/metrics.k8s.io/v1beta1/pods";

/// Read-only client for the Kubernetes API server, serving both the core
/// inventory and the metrics.k8s.io group.
pub struct KubeClient {
    client: Client,
    base_url: String,
}

impl KubeClient {
    pub fn new(config: kube::Config) -> Result<Self, ClientError> {
        let base_url = config.cluster_url.to_string().trim_end_matches('/').to_string();
        let client = Client::try_from(config).map_err(ClientError::Build)?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn list_all<K>(&self, path: &str) -> Result<Vec<K>, ClientError>
    where
        K: Resource + Clone + DeserializeOwned + Debug,
        K::DynamicType: Default,
    {
        debug!("GET {}{}", self.base_url, path);
        Api::<K>::all(self.client.clone())
            .list(&ListParams::default())
            .await
            .map(|list| list.items)
            .map_err(|source| ClientError::Api {
                path: path.to_string(),
                source,
            })
    }

    /// GET for API groups without typed bindings.
    async fn get_raw<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        debug!("GET {}{}", self.base_url, path);
        let request = http::Request::get(path)
            .body(Vec::new())
            .map_err(|source| ClientError::Request {
                path: path.to_string(),
                source,
            })?;

        self.client
            .request::<T>(request)
            .await
            .map_err(|source| ClientError::Api {
                path: path.to_string(),
                source,
            })
    }
}

#[async_trait]
impl InventorySource for KubeClient {
    async fn list_nodes(&self) -> Result<Vec<Node>, ClientError> {
        self.list_all(NODES_PATH).await
    }

    async fn list_pods(&self) -> Result<Vec<Pod>, ClientError> {
        self.list_all(PODS_PATH).await
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>, ClientError> {
        self.list_all(NAMESPACES_PATH).await
    }

    async fn server_version(&self) -> Result<String, ClientError> {
        debug!("GET {}{}", self.base_url, VERSION_PATH);
        self.client
            .apiserver_version()
            .await
            .map(|info| info.git_version)
            .map_err(|source| ClientError::Api {
                path: VERSION_PATH.to_string(),
                source,
            })
    }
}

#[async_trait]
impl MetricsSource for KubeClient {
    async fn list_node_metrics(&self) -> Result<Vec<NodeMetrics>, ClientError> {
        let list: MetricsList<NodeMetrics> = self.get_raw(NODE_METRICS_PATH).await?;
        Ok(list.items)
    }

    async fn list_pod_metrics(&self) -> Result<Vec<PodMetrics>, ClientError> {
        let list: MetricsList<PodMetrics> = self.get_raw(POD_METRICS_PATH).await?;
        Ok(list.items)
    }
}
