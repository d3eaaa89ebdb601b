use std::path::Path;

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::{Namespace, Node, Pod};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{api::ListParams, Api, Client};
use tracing::debug;

use crate::metrics::node_inventory;
use crate::types::NodeInventory;

/// Read access to the cluster objects the report is built from.
#[allow(async_fn_in_trait)]
pub trait ClusterInventory {
    async fn list_namespaces(&self) -> Result<Vec<String>>;
    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>>;
    async fn list_nodes(&self) -> Result<Vec<NodeInventory>>;
}

/// Load client settings from a kubeconfig file, using its current context.
pub async fn load_kube_config(path: &Path) -> Result<kube::Config> {
    let kubeconfig = Kubeconfig::read_from(path)
        .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
    kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .with_context(|| format!("Invalid kubeconfig {}", path.display()))
}

/// Build a client from `kubeconfig`, or from the environment when no path is known.
pub async fn connect(kubeconfig: Option<&Path>) -> Result<Client> {
    match kubeconfig {
        Some(path) => {
            let config = load_kube_config(path).await?;
            debug!(cluster = %config.cluster_url, "using kubeconfig {}", path.display());
            Ok(Client::try_from(config)?)
        }
        None => Ok(Client::try_default().await?),
    }
}

pub struct KubeInventory {
    client: Client,
}

impl KubeInventory {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl ClusterInventory for KubeInventory {
    async fn list_namespaces(&self) -> Result<Vec<String>> {
        let ns_api: Api<Namespace> = Api::all(self.client.clone());
        let namespaces = ns_api
            .list(&ListParams::default())
            .await
            .context("Failed to list namespaces")?;
        Ok(namespaces
            .items
            .into_iter()
            .filter_map(|ns| ns.metadata.name)
            .collect())
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>> {
        let pod_api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pods = pod_api
            .list(&ListParams::default())
            .await
            .with_context(|| format!("Failed to list pods in namespace {}", namespace))?;
        Ok(pods.items)
    }

    async fn list_nodes(&self) -> Result<Vec<NodeInventory>> {
        let node_api: Api<Node> = Api::all(self.client.clone());
        let nodes = node_api
            .list(&ListParams::default())
            .await
            .context("Failed to list nodes")?;
        Ok(nodes.items.iter().map(node_inventory).collect())
    }
}
