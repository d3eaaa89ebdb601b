use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::parsing::parse_go_duration;
use crate::types::Config;

pub const DEFAULT_PROMETHEUS_URL: &str = "http://localhost:9090";
pub const DEFAULT_TENANT: &str = "anonymous";
pub const MIN_QUERY_RANGE: Duration = Duration::from_secs(3600);

/// Capacity planning report built from Kubernetes inventory and Prometheus usage history
#[derive(Debug, Parser)]
#[command(name = "kube-capacity-reporter", version, long_about = None)]
pub struct Cli {
    /// The base URL for a Prometheus compatible PromQL API
    #[arg(long = "url", env = "PROMETHEUS_URL", default_value = DEFAULT_PROMETHEUS_URL)]
    pub url: String,

    /// The Tenant ID (X-Scope-OrgID) for Cortex/Mimir if applicable
    #[arg(long = "tenant", env = "PROMETHEUS_TENANT", default_value = DEFAULT_TENANT)]
    pub tenant: String,

    /// The duration of the query aggregation (e.g. 24h, 168h, 1h30m)
    #[arg(short = 'r', long = "r", env = "QUERY_RANGE", default_value = "24h", value_parser = parse_go_duration)]
    pub range: Duration,

    /// Path to the kubeconfig file (defaults to ~/.kube/config)
    #[arg(long = "kc")]
    pub kubeconfig: Option<PathBuf>,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid range; must be greater than 1 hour")]
    RangeTooShort(Duration),
}

impl Cli {
    pub fn into_config(self) -> Result<Config, ConfigError> {
        if self.range < MIN_QUERY_RANGE {
            return Err(ConfigError::RangeTooShort(self.range));
        }

        Ok(Config {
            prometheus_url: self.url,
            tenant: self.tenant,
            query_range: self.range,
            kubeconfig: self.kubeconfig.or_else(default_kubeconfig_path),
        })
    }
}

pub fn load_config() -> Result<Config, ConfigError> {
    Cli::parse().into_config()
}

pub fn default_kubeconfig_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".kube").join("config"))
}
