use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Pod;

use crate::types::{ContainerStats, PodStats, SkippedPod};

/// Label the Deployment controller stamps on the pods of each ReplicaSet.
pub const TEMPLATE_HASH_LABEL: &str = "pod-template-hash";
pub const RUNNING_PHASE: &str = "Running";

#[derive(Debug, Clone, PartialEq)]
pub enum PodRecord {
    Running(PodStats),
    Skipped(SkippedPod),
}

/// Build the usage record for one pod. Pods outside the `Running` phase are skipped.
pub fn build_pod_stats(pod: &Pod) -> PodRecord {
    let name = pod.metadata.name.clone().unwrap_or_default();
    let namespace = pod.metadata.namespace.clone().unwrap_or_default();
    let status = pod.status.as_ref();

    let phase = status.and_then(|s| s.phase.as_deref()).unwrap_or("Unknown");
    if phase != RUNNING_PHASE {
        return PodRecord::Skipped(SkippedPod {
            namespace,
            name,
            phase: phase.to_string(),
        });
    }

    let group_prefix = group_prefix(
        pod.metadata.generate_name.as_deref(),
        pod.metadata.labels.as_ref(),
    );
    let containers = pod
        .spec
        .as_ref()
        .map(|spec| {
            spec.containers
                .iter()
                .map(|c| ContainerStats::new(c.name.clone()))
                .collect()
        })
        .unwrap_or_default();

    PodRecord::Running(PodStats {
        name,
        namespace,
        node_name: pod
            .spec
            .as_ref()
            .and_then(|s| s.node_name.clone())
            .unwrap_or_default(),
        host_ip: status.and_then(|s| s.host_ip.clone()).unwrap_or_default(),
        pod_ip: status.and_then(|s| s.pod_ip.clone()).unwrap_or_default(),
        group_prefix,
        containers,
    })
}

/// Derive the owning workload's name from the pod's generate name.
///
/// `worker-` becomes `worker`. With a template hash label `abc123`, the generate
/// name `foo-abc123-` becomes `foo`, dropping the ReplicaSet suffix as well.
/// Pods without a generate name get an empty prefix.
pub fn group_prefix(
    generate_name: Option<&str>,
    labels: Option<&BTreeMap<String, String>>,
) -> String {
    let generate_name = generate_name.unwrap_or("");

    if let Some(hash) = labels.and_then(|l| l.get(TEMPLATE_HASH_LABEL)) {
        return generate_name.replace(&format!("-{}-", hash), "");
    }

    let mut prefix = generate_name.to_string();
    prefix.pop();
    prefix
}
