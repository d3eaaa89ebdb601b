use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use anyhow::{anyhow, Result};
use k8s_openapi::api::core::v1::{Container, Pod, PodSpec, PodStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use kube_capacity_reporter::prometheus::{cpu_query, memory_query};
use kube_capacity_reporter::{
    CapacityReport, ClusterInventory, Config, MetricSample, MetricSource, MetricsError,
    NodeInventory, SkippedPod, StatsCollector, TEMPLATE_HASH_LABEL,
};

const GIB: f64 = 1_073_741_824.0;

#[derive(Default)]
struct FakeCluster {
    namespaces: Vec<String>,
    pods: HashMap<String, Vec<Pod>>,
    nodes: Vec<NodeInventory>,
    listed: RefCell<Vec<String>>,
}

impl ClusterInventory for FakeCluster {
    async fn list_namespaces(&self) -> Result<Vec<String>> {
        Ok(self.namespaces.clone())
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>> {
        self.listed.borrow_mut().push(namespace.to_string());
        self.pods
            .get(namespace)
            .cloned()
            .ok_or_else(|| anyhow!("namespace {} not found", namespace))
    }

    async fn list_nodes(&self) -> Result<Vec<NodeInventory>> {
        Ok(self.nodes.clone())
    }
}

#[derive(Default)]
struct FakeMetrics {
    responses: HashMap<String, Vec<MetricSample>>,
    failing: bool,
    queries: RefCell<Vec<String>>,
}

impl MetricSource for FakeMetrics {
    async fn query(&self, promql: &str) -> Result<Vec<MetricSample>, MetricsError> {
        self.queries.borrow_mut().push(promql.to_string());
        if self.failing {
            return Err(MetricsError::Query {
                error_type: "timeout".to_string(),
                message: "query timed out".to_string(),
            });
        }
        Ok(self.responses.get(promql).cloned().unwrap_or_default())
    }
}

fn config() -> Config {
    Config {
        prometheus_url: "http://localhost:9090".to_string(),
        tenant: "anonymous".to_string(),
        query_range: Duration::from_secs(24 * 3600),
        kubeconfig: None,
    }
}

fn node(name: &str, cpu: f64, memory: f64) -> NodeInventory {
    NodeInventory {
        name: name.to_string(),
        allocatable_cpu: cpu,
        allocatable_memory: memory,
        labels: BTreeMap::new(),
    }
}

fn pod(namespace: &str, name: &str, phase: &str, node: &str, containers: &[&str]) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(PodSpec {
            node_name: Some(node.to_string()),
            containers: containers
                .iter()
                .map(|c| Container {
                    name: c.to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }),
        status: Some(PodStatus {
            phase: Some(phase.to_string()),
            ..Default::default()
        }),
    }
}

fn deployment_pod(namespace: &str, name: &str, hash: &str, node: &str) -> Pod {
    let mut p = pod(namespace, name, "Running", node, &["app"]);
    let workload = name.split('-').next().unwrap_or_default();
    p.metadata.generate_name = Some(format!("{}-{}-", workload, hash));
    p.metadata.labels = Some(BTreeMap::from([(TEMPLATE_HASH_LABEL.to_string(), hash.to_string())]));
    p
}

fn sample(pod: &str, container: &str, value: f64) -> MetricSample {
    MetricSample {
        labels: HashMap::from([
            ("pod".to_string(), pod.to_string()),
            ("container".to_string(), container.to_string()),
        ]),
        value,
    }
}

fn render(report: &CapacityReport<'_>) -> String {
    let mut buf = Vec::new();
    report.write_to(&mut buf).unwrap();
    String::from_utf8(buf).unwrap()
}

#[test]
fn test_end_to_end_single_node() {
    let cluster = FakeCluster {
        namespaces: vec!["shop".to_string()],
        pods: HashMap::from([(
            "shop".to_string(),
            vec![deployment_pod("shop", "web-5d8f7-abcde", "5d8f7", "node-a")],
        )]),
        nodes: vec![node("node-a", 4.0, 8.0 * GIB)],
        ..Default::default()
    };
    let metrics = FakeMetrics {
        responses: HashMap::from([
            (memory_query("shop", "24h"), vec![sample("web-5d8f7-abcde", "app", GIB)]),
            (cpu_query("shop", "24h"), vec![sample("web-5d8f7-abcde", "app", 2.0)]),
        ]),
        ..Default::default()
    };
    let cfg = config();

    let collection = tokio_test::block_on(StatsCollector::new(&cluster, &metrics, &cfg).collect()).unwrap();
    let nodes = tokio_test::block_on(cluster.list_nodes()).unwrap();
    let text = render(&CapacityReport::new(&collection.stats, &nodes));

    assert!(text.starts_with(
        "Node(name: node-a, allocatable-cpu: 4, used-cpu: 2.0000 (50.00%), allocatable-mem: 8.0Gi, used-mem: 1.0Gi (12.50%))"
    ));
    assert!(text.contains("    Container(name: app, used-cpu: 2.0000 (50.00%), used-mem: 1.0Gi (12.50%))"));
    assert!(text.ends_with("Group web, suggested-cpu: 2000m, suggested-memory: 1.0Gi\n"));
    assert!(collection.skipped.is_empty());
}

#[test]
fn test_queries_memory_then_cpu_and_skips_system_namespaces() {
    let cluster = FakeCluster {
        namespaces: vec!["kube-system".to_string(), "shop".to_string(), "kube-public".to_string(), "ops".to_string()],
        pods: HashMap::from([("shop".to_string(), vec![]), ("ops".to_string(), vec![])]),
        ..Default::default()
    };
    let metrics = FakeMetrics::default();
    let cfg = config();

    tokio_test::block_on(StatsCollector::new(&cluster, &metrics, &cfg).collect()).unwrap();

    assert_eq!(
        *metrics.queries.borrow(),
        vec![
            memory_query("shop", "24h"),
            cpu_query("shop", "24h"),
            memory_query("ops", "24h"),
            cpu_query("ops", "24h"),
        ]
    );
    assert_eq!(*cluster.listed.borrow(), vec!["shop".to_string(), "ops".to_string()]);
}

#[test]
fn test_pending_pod_is_skipped_and_processing_continues() {
    let cluster = FakeCluster {
        namespaces: vec!["shop".to_string()],
        pods: HashMap::from([(
            "shop".to_string(),
            vec![
                pod("shop", "cart-0", "Pending", "", &["app"]),
                pod("shop", "cart-1", "Running", "node-a", &["app"]),
            ],
        )]),
        ..Default::default()
    };
    let metrics = FakeMetrics {
        responses: HashMap::from([(
            cpu_query("shop", "24h"),
            vec![sample("cart-0", "app", 5.0), sample("cart-1", "app", 0.5)],
        )]),
        ..Default::default()
    };
    let cfg = config();

    let collection = tokio_test::block_on(StatsCollector::new(&cluster, &metrics, &cfg).collect()).unwrap();

    assert_eq!(
        collection.skipped,
        vec![SkippedPod {
            namespace: "shop".to_string(),
            name: "cart-0".to_string(),
            phase: "Pending".to_string(),
        }]
    );
    assert_eq!(collection.stats.len(), 1);
    assert_eq!(collection.stats.node_usage("node-a").cpu, 0.5);
    assert!(collection.stats.pods().all(|p| p.name != "cart-0"));
}

#[test]
fn test_unmatched_samples_are_dropped() {
    let cluster = FakeCluster {
        namespaces: vec!["shop".to_string()],
        pods: HashMap::from([("shop".to_string(), vec![pod("shop", "cart-1", "Running", "node-a", &["app"])])]),
        ..Default::default()
    };
    let metrics = FakeMetrics {
        responses: HashMap::from([(
            memory_query("shop", "24h"),
            vec![sample("cart-9", "app", GIB), sample("cart-1", "istio-proxy", GIB)],
        )]),
        ..Default::default()
    };
    let cfg = config();

    let collection = tokio_test::block_on(StatsCollector::new(&cluster, &metrics, &cfg).collect()).unwrap();

    let usage = collection.stats.node_usage("node-a");
    assert_eq!(usage.cpu, 0.0);
    assert_eq!(usage.memory, 0.0);
}

#[test]
fn test_metric_failure_aborts_collection() {
    let cluster = FakeCluster {
        namespaces: vec!["shop".to_string()],
        pods: HashMap::from([("shop".to_string(), vec![])]),
        ..Default::default()
    };
    let metrics = FakeMetrics {
        failing: true,
        ..Default::default()
    };
    let cfg = config();

    let err = tokio_test::block_on(StatsCollector::new(&cluster, &metrics, &cfg).collect()).unwrap_err();

    assert!(err.to_string().contains("Memory query failed for namespace shop"));
    assert_eq!(metrics.queries.borrow().len(), 1);
    assert!(cluster.listed.borrow().is_empty());
}

#[test]
fn test_inventory_failure_aborts_collection() {
    let cluster = FakeCluster {
        namespaces: vec!["shop".to_string(), "missing".to_string()],
        pods: HashMap::from([("shop".to_string(), vec![])]),
        ..Default::default()
    };
    let metrics = FakeMetrics::default();
    let cfg = config();

    let result = tokio_test::block_on(StatsCollector::new(&cluster, &metrics, &cfg).collect());
    assert!(result.is_err());
}

#[test]
fn test_group_sizing_across_nodes() {
    let cluster = FakeCluster {
        namespaces: vec!["shop".to_string()],
        pods: HashMap::from([(
            "shop".to_string(),
            vec![
                deployment_pod("shop", "api-7c4f9-aaaaa", "7c4f9", "node-a"),
                deployment_pod("shop", "api-7c4f9-bbbbb", "7c4f9", "node-b"),
                pod("shop", "batch-run", "Running", "node-b", &["app"]),
            ],
        )]),
        nodes: vec![node("node-a", 8.0, 32.0 * GIB), node("node-b", 8.0, 32.0 * GIB)],
        ..Default::default()
    };
    let metrics = FakeMetrics {
        responses: HashMap::from([
            (
                memory_query("shop", "24h"),
                vec![sample("api-7c4f9-aaaaa", "app", 3.0 * GIB), sample("api-7c4f9-bbbbb", "app", GIB)],
            ),
            (
                cpu_query("shop", "24h"),
                vec![
                    sample("api-7c4f9-aaaaa", "app", 0.5),
                    sample("api-7c4f9-bbbbb", "app", 1.2),
                    sample("batch-run", "app", 4.0),
                ],
            ),
        ]),
        ..Default::default()
    };
    let cfg = config();

    let collection = tokio_test::block_on(StatsCollector::new(&cluster, &metrics, &cfg).collect()).unwrap();
    let report = CapacityReport::new(&collection.stats, &cluster.nodes);
    let text = render(&report);

    assert!(text.contains("Group api, suggested-cpu: 1200m, suggested-memory: 3.0Gi"));
    assert!(text.contains("  Pod(name: batch-run,"));
    assert_eq!(report.group_sizing().len(), 1);
}

#[test]
fn test_same_pod_name_in_two_namespaces_receives_samples_on_both_nodes() {
    let cluster = FakeCluster {
        namespaces: vec!["team-a".to_string(), "team-b".to_string()],
        pods: HashMap::from([
            ("team-a".to_string(), vec![pod("team-a", "postgres-0", "Running", "node-1", &["db"])]),
            ("team-b".to_string(), vec![pod("team-b", "postgres-0", "Running", "node-2", &["db"])]),
        ]),
        nodes: vec![node("node-1", 4.0, 8.0 * GIB), node("node-2", 4.0, 8.0 * GIB)],
        ..Default::default()
    };
    let metrics = FakeMetrics {
        responses: HashMap::from([
            (memory_query("team-a", "24h"), vec![sample("postgres-0", "db", GIB)]),
            (cpu_query("team-a", "24h"), vec![sample("postgres-0", "db", 0.5)]),
            (memory_query("team-b", "24h"), vec![sample("postgres-0", "db", 2.0 * GIB)]),
            (cpu_query("team-b", "24h"), vec![sample("postgres-0", "db", 3.0)]),
        ]),
        ..Default::default()
    };
    let cfg = config();

    let collection = tokio_test::block_on(StatsCollector::new(&cluster, &metrics, &cfg).collect()).unwrap();
    let text = render(&CapacityReport::new(&collection.stats, &cluster.nodes));

    // samples join on (pod, container) only, so the later namespace's values land on both pods
    for node in ["node-1", "node-2"] {
        assert!(text.contains(&format!(
            "Node(name: {}, allocatable-cpu: 4, used-cpu: 3.0000 (75.00%), allocatable-mem: 8.0Gi, used-mem: 2.0Gi (25.00%))",
            node
        )));
    }
    assert_eq!(
        text.matches("  Pod(name: postgres-0, host-ip: , pod-ip: , used-cpu: 3.0000 (75.00%), used-mem: 2.0Gi (25.00%))")
            .count(),
        2
    );
}
