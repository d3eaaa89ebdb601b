use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::kubernetes::ClusterInventory;
use crate::metrics::{build_pod_stats, NodeStats, PodRecord};
use crate::parsing::format_prometheus_duration;
use crate::prometheus::{cpu_query, memory_query, MetricSource};
use crate::types::{Config, ResourceKind, SkippedPod};

/// Namespaces starting with this prefix belong to the control plane and are not reported.
pub const SYSTEM_NAMESPACE_PREFIX: &str = "kube-";

pub fn is_system_namespace(namespace: &str) -> bool {
    namespace.starts_with(SYSTEM_NAMESPACE_PREFIX)
}

/// Walks every workload namespace and joins its running pods with their peak usage.
pub struct StatsCollector<'a, I, M> {
    inventory: &'a I,
    metrics: &'a M,
    config: &'a Config,
}

impl<'a, I: ClusterInventory, M: MetricSource> StatsCollector<'a, I, M> {
    pub fn new(inventory: &'a I, metrics: &'a M, config: &'a Config) -> Self {
        Self {
            inventory,
            metrics,
            config,
        }
    }

    /// Collect usage for all non-system namespaces, one after the other.
    /// The first failing inventory or metric call aborts the collection.
    pub async fn collect(&self) -> Result<NodeStatsCollection> {
        let namespaces = self.inventory.list_namespaces().await?;
        let mut collection = NodeStatsCollection::default();

        for ns in namespaces.iter().filter(|ns| !is_system_namespace(ns)) {
            self.collect_namespace(ns, &mut collection).await?;
        }

        Ok(collection)
    }

    async fn collect_namespace(
        &self,
        namespace: &str,
        collection: &mut NodeStatsCollection,
    ) -> Result<()> {
        info!("Collecting usage for namespace: {}", namespace);
        let range = format_prometheus_duration(self.config.query_range);

        let memory = self
            .metrics
            .query(&memory_query(namespace, &range))
            .await
            .with_context(|| format!("Memory query failed for namespace {}", namespace))?;
        let cpu = self
            .metrics
            .query(&cpu_query(namespace, &range))
            .await
            .with_context(|| format!("CPU query failed for namespace {}", namespace))?;

        let pods = self.inventory.list_pods(namespace).await?;
        for pod in &pods {
            match build_pod_stats(pod) {
                PodRecord::Running(stats) => collection.stats.append_pod(stats),
                PodRecord::Skipped(skipped) => {
                    warn!(
                        "pod {} is not running ({}), skipping...",
                        skipped.name, skipped.phase
                    );
                    collection.skipped.push(skipped);
                }
            }
        }

        let matched_memory = collection.stats.apply_samples(ResourceKind::Memory, &memory);
        let matched_cpu = collection.stats.apply_samples(ResourceKind::Cpu, &cpu);
        debug!(
            namespace,
            memory_samples = memory.len(),
            matched_memory,
            cpu_samples = cpu.len(),
            matched_cpu,
            "applied usage samples"
        );

        Ok(())
    }
}

/// Result of a collection run.
#[derive(Debug, Default)]
pub struct NodeStatsCollection {
    pub stats: NodeStats,
    pub skipped: Vec<SkippedPod>,
}
