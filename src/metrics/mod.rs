// Usage aggregation: pod records and the per-node join
pub mod pods;
pub mod nodes;

// Re-export commonly used items
pub use pods::{build_pod_stats, group_prefix, PodRecord, RUNNING_PHASE, TEMPLATE_HASH_LABEL};
pub use nodes::{node_inventory, NodeStats};
