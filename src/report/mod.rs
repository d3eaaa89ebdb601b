use std::collections::BTreeMap;
use std::io::{self, Write};

use crate::metrics::NodeStats;
use crate::parsing::{byte_count_iec, percent_of};
use crate::prometheus::QUERY_STEP;
use crate::types::{NodeInventory, ResourceUsage};

/// Text report of node capacity, per-pod usage and suggested sizing per workload group.
pub struct CapacityReport<'a> {
    stats: &'a NodeStats,
    nodes: &'a [NodeInventory],
}

impl<'a> CapacityReport<'a> {
    pub fn new(stats: &'a NodeStats, nodes: &'a [NodeInventory]) -> Self {
        Self { stats, nodes }
    }

    /// Peak per-pod CPU and memory of every named group, across all listed nodes.
    /// The two maxima are tracked independently and may come from different pods.
    pub fn group_sizing(&self) -> BTreeMap<String, ResourceUsage> {
        let mut groups: BTreeMap<String, ResourceUsage> = BTreeMap::new();
        for node in self.nodes {
            for pod in self.stats.pods_on_node(&node.name) {
                if pod.group_prefix.is_empty() {
                    continue;
                }
                groups
                    .entry(pod.group_prefix.clone())
                    .or_default()
                    .max_with(&pod.totals());
            }
        }
        groups
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for node in self.nodes {
            self.write_node(out, node)?;
        }
        for (group, peak) in self.group_sizing() {
            writeln!(
                out,
                "Group {}, suggested-cpu: {:.0}m, suggested-memory: {}",
                group,
                peak.cpu * 1000.0,
                byte_count_iec(peak.memory)
            )?;
        }
        Ok(())
    }

    fn write_node<W: Write>(&self, out: &mut W, node: &NodeInventory) -> io::Result<()> {
        let cpu_cap = node.allocatable_cpu;
        let mem_cap = node.allocatable_memory;
        let used = self.stats.node_usage(&node.name);

        writeln!(
            out,
            "Node(name: {}, allocatable-cpu: {:.0}, used-cpu: {:.4} ({:.2}%), allocatable-mem: {}, used-mem: {} ({:.2}%))",
            node.name,
            cpu_cap,
            used.cpu,
            percent_of(used.cpu, cpu_cap),
            byte_count_iec(mem_cap),
            byte_count_iec(used.memory),
            percent_of(used.memory, mem_cap),
        )?;
        for (key, value) in &node.labels {
            writeln!(out, "  Label: {} = {}", key, value)?;
        }

        for pod in self.stats.pods_on_node(&node.name) {
            let totals = pod.totals();
            writeln!(
                out,
                "  Pod(name: {}, host-ip: {}, pod-ip: {}, used-cpu: {:.4} ({:.2}%), used-mem: {} ({:.2}%))",
                pod.name,
                pod.host_ip,
                pod.pod_ip,
                totals.cpu,
                percent_of(totals.cpu, cpu_cap),
                byte_count_iec(totals.memory),
                percent_of(totals.memory, mem_cap),
            )?;
            for c in &pod.containers {
                writeln!(
                    out,
                    "    Container(name: {}, used-cpu: {:.4} ({:.2}%), used-mem: {} ({:.2}%))",
                    c.name,
                    c.cpu,
                    percent_of(c.cpu, cpu_cap),
                    byte_count_iec(c.memory),
                    percent_of(c.memory, mem_cap),
                )?;
            }
        }
        writeln!(out)
    }
}

/// Banner naming the subquery window, printed before the report.
pub fn write_header<W: Write>(out: &mut W, range: &str) -> io::Result<()> {
    writeln!(
        out,
        "Executing Prometheus Query aggregations for max_over_time with [{}:{}]\n",
        range, QUERY_STEP
    )
}
