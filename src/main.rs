use std::io::{self, Write};
use std::process;

use anyhow::Result;
use tracing::info;

use kube_capacity_reporter::{
    connect, format_prometheus_duration, load_config, write_header, CapacityReport,
    ClusterInventory, KubeInventory, PrometheusClient, StatsCollector,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cfg = match load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };
    info!("prometheus = {}, tenant = {}", cfg.prometheus_url, cfg.tenant);

    let mut out = io::stdout();
    write_header(&mut out, &format_prometheus_duration(cfg.query_range))?;

    let client = connect(cfg.kubeconfig.as_deref()).await?;
    let inventory = KubeInventory::new(client);
    let prometheus = PrometheusClient::new(&cfg.prometheus_url, &cfg.tenant)?;

    let collection = StatsCollector::new(&inventory, &prometheus, &cfg)
        .collect()
        .await?;
    info!(
        "Collected {} running pods ({} skipped)",
        collection.stats.len(),
        collection.skipped.len()
    );

    let nodes = inventory.list_nodes().await?;
    CapacityReport::new(&collection.stats, &nodes).write_to(&mut out)?;
    out.flush()?;

    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}
