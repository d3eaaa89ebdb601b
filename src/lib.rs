// Public modules
pub mod types;
pub mod config;
pub mod parsing;
pub mod prometheus;
pub mod kubernetes;
pub mod metrics;
pub mod collector;
pub mod report;

// Re-export commonly used items
pub use types::*;
pub use config::{load_config, Cli, ConfigError};
pub use parsing::{byte_count_iec, format_prometheus_duration, parse_go_duration, parse_quantity, percent_of};
pub use prometheus::{MetricSource, MetricsError, PrometheusClient};
pub use kubernetes::{connect, ClusterInventory, KubeInventory};
pub use metrics::*;
pub use collector::{NodeStatsCollection, StatsCollector};
pub use report::{write_header, CapacityReport};
