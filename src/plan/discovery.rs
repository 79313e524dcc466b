use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::collectors::{Collector, CollectorError, HttpCollector};

/// A discovery query against the cluster failed, so the sub-plan depending on
/// it could not be built.
#[derive(Debug, thiserror::Error)]
pub enum PreparationError {
    #[error("request to {addr} failed: {source}")]
    Request {
        addr: String,
        #[source]
        source: CollectorError,
    },

    #[error("unexpected response from {addr}: {source}")]
    Decode {
        addr: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Queries the cluster for what there is to collect.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Database names known to the TiDB status server at `status_addr`
    async fn list_databases(&self, status_addr: &str) -> Result<Vec<String>, PreparationError>;

    /// Metric names known to the Prometheus server at `prometheus_addr`
    async fn list_metrics(&self, prometheus_addr: &str) -> Result<Vec<String>, PreparationError>;
}

#[derive(Debug, Deserialize)]
struct SchemaEntry {
    db_name: SchemaName,
}

#[derive(Debug, Deserialize)]
struct SchemaName {
    #[serde(rename = "L")]
    lower: String,
}

#[derive(Debug, Deserialize)]
struct LabelValues {
    data: Vec<String>,
}

/// Discovery over the TiDB status API and the Prometheus HTTP API
#[derive(Debug, Clone)]
pub struct HttpDiscovery {
    client: Client,
    timeout: Duration,
}

impl HttpDiscovery {
    pub fn new(client: &Client, timeout: Duration) -> Self {
        Self {
            client: client.clone(),
            timeout,
        }
    }

    async fn fetch<T: DeserializeOwned + Send>(
        &self,
        name: &str,
        addr: &str,
        path: &str,
    ) -> Result<T, PreparationError> {
        let body = HttpCollector::new(&self.client, name, addr, path)
            .with_timeout(self.timeout)
            .collect()
            .await
            .map_err(|source| PreparationError::Request {
                addr: addr.to_string(),
                source,
            })?;
        serde_json::from_slice(&body).map_err(|source| PreparationError::Decode {
            addr: addr.to_string(),
            source,
        })
    }
}

#[async_trait]
impl Discovery for HttpDiscovery {
    async fn list_databases(&self, status_addr: &str) -> Result<Vec<String>, PreparationError> {
        let entries: Vec<SchemaEntry> = self.fetch("schema list", status_addr, "/schema").await?;
        let names: Vec<String> = entries.into_iter().map(|e| e.db_name.lower).collect();
        debug!("Discovered {} databases on {}", names.len(), status_addr);
        Ok(names)
    }

    async fn list_metrics(&self, prometheus_addr: &str) -> Result<Vec<String>, PreparationError> {
        let values: LabelValues = self
            .fetch("metric list", prometheus_addr, "/api/v1/label/__name__/values")
            .await?;
        debug!("Discovered {} metrics on {}", values.data.len(), prometheus_addr);
        Ok(values.data)
    }
}
