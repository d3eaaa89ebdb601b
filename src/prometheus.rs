use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::MetricSample;

/// Header carrying the tenant id for Cortex/Mimir style multi-tenant backends.
pub const TENANT_HEADER: &str = "X-Scope-OrgID";
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(30);
/// Resolution of the max_over_time subquery.
pub const QUERY_STEP: &str = "1h";

const MEMORY_QUERY: &str = r#"container_memory_working_set_bytes{job="kubelet", metrics_path="/metrics/cadvisor", namespace="{namespace}", container!="", image!=""}"#;
const CPU_QUERY: &str = r#"node_namespace_pod_container:container_cpu_usage_seconds_total:sum_irate{namespace="{namespace}", container!=""}"#;

/// Peak working-set memory per container of `namespace` over `range`.
pub fn memory_query(namespace: &str, range: &str) -> String {
    max_over_time(MEMORY_QUERY, namespace, range)
}

/// Peak CPU usage rate per container of `namespace` over `range`.
pub fn cpu_query(namespace: &str, range: &str) -> String {
    max_over_time(CPU_QUERY, namespace, range)
}

fn max_over_time(selector: &str, namespace: &str, range: &str) -> String {
    format!(
        "max_over_time({}[{}:{}])",
        selector.replace("{namespace}", namespace),
        range,
        QUERY_STEP
    )
}

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Invalid Prometheus URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Prometheus returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Query failed ({error_type}): {message}")]
    Query { error_type: String, message: String },

    #[error("Failed to parse response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Unexpected result type {0:?}, expected vector")]
    UnexpectedResultType(String),

    #[error("Invalid sample value {0:?}")]
    InvalidSampleValue(String),
}

/// Anything that can answer an instant PromQL query with a vector of samples.
#[allow(async_fn_in_trait)]
pub trait MetricSource {
    async fn query(&self, promql: &str) -> Result<Vec<MetricSample>, MetricsError>;
}

/// Instant-query client for a Prometheus compatible HTTP API.
#[derive(Debug, Clone)]
pub struct PrometheusClient {
    base_url: String,
    tenant: String,
    http: Client,
}

impl PrometheusClient {
    pub fn new(url: &str, tenant: &str) -> Result<Self, MetricsError> {
        let base_url = url.trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(MetricsError::InvalidUrl(format!(
                "{} (must start with http:// or https://)",
                url
            )));
        }

        let http = Client::builder().timeout(QUERY_TIMEOUT).build()?;

        Ok(Self {
            base_url,
            tenant: tenant.to_string(),
            http,
        })
    }

    #[cfg(test)]
    fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Evaluate `promql` at `time`.
    pub async fn query_at(
        &self,
        promql: &str,
        time: DateTime<Utc>,
    ) -> Result<Vec<MetricSample>, MetricsError> {
        debug!(query = promql, "executing instant query");
        let url = format!("{}/api/v1/query", self.base_url);
        let timestamp = time.timestamp().to_string();
        let response = self
            .http
            .get(&url)
            .header(TENANT_HEADER, &self.tenant)
            .query(&[("query", promql), ("time", timestamp.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            // Prometheus reports query errors with a JSON envelope and a 4xx/5xx status
            return Err(match serde_json::from_str::<QueryResponse>(&body) {
                Ok(envelope) if envelope.error.is_some() => envelope.into_error(),
                _ => MetricsError::Status { status, body },
            });
        }

        let envelope: QueryResponse = serde_json::from_str(&body)?;
        envelope.into_samples()
    }
}

impl MetricSource for PrometheusClient {
    async fn query(&self, promql: &str) -> Result<Vec<MetricSample>, MetricsError> {
        self.query_at(promql, Utc::now()).await
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    status: String,
    data: Option<QueryData>,
    #[serde(rename = "errorType")]
    error_type: Option<String>,
    error: Option<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(rename = "resultType")]
    result_type: String,
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct VectorSample {
    metric: HashMap<String, String>,
    value: (f64, String),
}

impl QueryResponse {
    fn into_error(self) -> MetricsError {
        MetricsError::Query {
            error_type: self.error_type.unwrap_or_else(|| "unknown".to_string()),
            message: self.error.unwrap_or_else(|| "unknown error".to_string()),
        }
    }

    fn into_samples(self) -> Result<Vec<MetricSample>, MetricsError> {
        if self.status != "success" {
            return Err(self.into_error());
        }
        if !self.warnings.is_empty() {
            warn!(warnings = ?self.warnings, "Prometheus returned warnings");
        }

        let data = match self.data {
            Some(d) => d,
            None => return Ok(Vec::new()),
        };
        if data.result_type != "vector" {
            return Err(MetricsError::UnexpectedResultType(data.result_type));
        }

        let vector: Vec<VectorSample> = serde_json::from_value(data.result)?;
        vector
            .into_iter()
            .map(|s| {
                let value = parse_sample_value(&s.value.1)?;
                Ok(MetricSample {
                    labels: s.metric,
                    value,
                })
            })
            .collect()
    }
}

/// Sample values arrive as strings and may be `NaN`, `+Inf` or `-Inf`.
fn parse_sample_value(raw: &str) -> Result<f64, MetricsError> {
    match raw {
        "+Inf" => Ok(f64::INFINITY),
        "-Inf" => Ok(f64::NEG_INFINITY),
        "NaN" => Ok(f64::NAN),
        _ => raw
            .parse::<f64>()
            .map_err(|_| MetricsError::InvalidSampleValue(raw.to_string())),
    }
}
