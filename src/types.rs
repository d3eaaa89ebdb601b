use std::collections::{BTreeMap, HashMap};
use std::ops::AddAssign;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub prometheus_url: String,
    pub tenant: String,
    pub query_range: Duration,
    pub kubeconfig: Option<PathBuf>,
}

/// Which usage value a metric sample carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Cpu,
    Memory,
}

/// CPU in cores and memory in bytes.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ResourceUsage {
    pub cpu: f64,
    pub memory: f64,
}

impl ResourceUsage {
    pub fn new(cpu: f64, memory: f64) -> Self {
        Self { cpu, memory }
    }

    /// Raise each component independently to the larger of the two values.
    pub fn max_with(&mut self, other: &ResourceUsage) {
        if other.cpu > self.cpu {
            self.cpu = other.cpu;
        }
        if other.memory > self.memory {
            self.memory = other.memory;
        }
    }
}

impl AddAssign for ResourceUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.cpu += rhs.cpu;
        self.memory += rhs.memory;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerStats {
    pub name: String,
    pub cpu: f64,
    pub memory: f64,
}

impl ContainerStats {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cpu: 0.0,
            memory: 0.0,
        }
    }

    pub fn set(&mut self, kind: ResourceKind, value: f64) {
        match kind {
            ResourceKind::Cpu => self.cpu = value,
            ResourceKind::Memory => self.memory = value,
        }
    }

    pub fn usage(&self) -> ResourceUsage {
        ResourceUsage::new(self.cpu, self.memory)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PodStats {
    pub name: String,
    pub namespace: String,
    pub node_name: String,
    pub host_ip: String,
    pub pod_ip: String,
    /// Approximate name of the owning workload; empty when it cannot be derived.
    pub group_prefix: String,
    pub containers: Vec<ContainerStats>,
}

impl PodStats {
    /// Sum of CPU and memory over every container of the pod.
    pub fn totals(&self) -> ResourceUsage {
        let mut totals = ResourceUsage::default();
        for c in &self.containers {
            totals += c.usage();
        }
        totals
    }
}

/// A pod left out of the report because it was not running.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedPod {
    pub namespace: String,
    pub name: String,
    pub phase: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeInventory {
    pub name: String,
    /// Cores.
    pub allocatable_cpu: f64,
    /// Bytes.
    pub allocatable_memory: f64,
    pub labels: BTreeMap<String, String>,
}

/// One element of an instant-vector query result.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub labels: HashMap<String, String>,
    pub value: f64,
}

impl MetricSample {
    pub fn label(&self, name: &str) -> &str {
        self.labels.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn pod(&self) -> &str {
        self.label("pod")
    }

    pub fn container(&self) -> &str {
        self.label("container")
    }
}
