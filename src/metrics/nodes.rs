use std::collections::HashMap;

use k8s_openapi::api::core::v1::Node;

use crate::parsing::parse_quantity;
use crate::types::{MetricSample, NodeInventory, PodStats, ResourceKind, ResourceUsage};

/// Running pods grouped by the node they are scheduled on, with per-container usage.
///
/// Pods are appended during inventory collection; afterwards only the usage values of
/// their containers change. Metric samples find their containers through an index keyed
/// by `(pod name, container name)`. Pod names repeat across namespaces, so a key can
/// point at several containers and a sample updates all of them.
#[derive(Debug, Default)]
pub struct NodeStats {
    pods: Vec<PodStats>,
    by_node: HashMap<String, Vec<usize>>,
    containers: HashMap<(String, String), Vec<(usize, usize)>>,
}

impl NodeStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pod under its own node name, after any pods already recorded there.
    pub fn append_pod(&mut self, pod: PodStats) {
        let pod_idx = self.pods.len();
        for (container_idx, c) in pod.containers.iter().enumerate() {
            self.containers
                .entry((pod.name.clone(), c.name.clone()))
                .or_default()
                .push((pod_idx, container_idx));
        }
        self.by_node
            .entry(pod.node_name.clone())
            .or_default()
            .push(pod_idx);
        self.pods.push(pod);
    }

    /// Overwrite one usage value of every container matching `pod_name` and
    /// `container_name`. Returns `false`, leaving everything untouched, when no pod has
    /// that container.
    pub fn update_container_stats(
        &mut self,
        kind: ResourceKind,
        pod_name: &str,
        container_name: &str,
        value: f64,
    ) -> bool {
        let key = (pod_name.to_string(), container_name.to_string());
        let Some(locations) = self.containers.get(&key) else {
            return false;
        };
        for &(pod_idx, container_idx) in locations {
            self.pods[pod_idx].containers[container_idx].set(kind, value);
        }
        !locations.is_empty()
    }

    /// Apply query results by their `pod` and `container` labels. Returns how many matched.
    pub fn apply_samples(&mut self, kind: ResourceKind, samples: &[MetricSample]) -> usize {
        samples
            .iter()
            .filter(|s| self.update_container_stats(kind, s.pod(), s.container(), s.value))
            .count()
    }

    pub fn pods_on_node<'a>(&'a self, node: &str) -> impl Iterator<Item = &'a PodStats> + 'a {
        self.by_node
            .get(node)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.pods[idx])
    }

    /// Summed usage of every container scheduled on `node`.
    pub fn node_usage(&self, node: &str) -> ResourceUsage {
        let mut usage = ResourceUsage::default();
        for pod in self.pods_on_node(node) {
            usage += pod.totals();
        }
        usage
    }

    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.by_node.keys().map(String::as_str)
    }

    pub fn pods(&self) -> impl Iterator<Item = &PodStats> {
        self.pods.iter()
    }

    pub fn len(&self) -> usize {
        self.pods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pods.is_empty()
    }
}

/// Name, allocatable capacity and labels of a node. Missing quantities read as zero.
pub fn node_inventory(node: &Node) -> NodeInventory {
    let allocatable = node.status.as_ref().and_then(|s| s.allocatable.as_ref());
    let quantity = |key: &str| {
        allocatable
            .and_then(|a| a.get(key))
            .and_then(|q| parse_quantity(&q.0))
            .unwrap_or(0.0)
    };

    NodeInventory {
        name: node.metadata.name.clone().unwrap_or_default(),
        allocatable_cpu: quantity("cpu"),
        allocatable_memory: quantity("memory"),
        labels: node.metadata.labels.clone().unwrap_or_default(),
    }
}
