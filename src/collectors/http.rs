use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::debug;

use super::{Collector, CollectorError, CollectorResult};

/// Collects the body of an HTTP GET against `http://{addr}{path}/{segments}?{params}`.
///
/// Collectors share one `reqwest::Client`, so requests to the same instance
/// reuse pooled connections.
#[derive(Debug, Clone)]
pub struct HttpCollector {
    client: Client,
    name: String,
    addr: String,
    path: String,
    segments: Vec<String>,
    params: Vec<(String, String)>,
    timeout: Option<Duration>,
}

impl HttpCollector {
    pub fn new(
        client: &Client,
        name: impl Into<String>,
        addr: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            client: client.clone(),
            name: name.into(),
            addr: addr.into(),
            path: path.into(),
            segments: Vec::new(),
            params: Vec::new(),
            timeout: None,
        }
    }

    /// Append one path segment; `/`, `%` and other reserved characters are percent-encoded
    pub fn with_segment(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the request URL with segments and query parameters encoded
    pub fn url(&self) -> CollectorResult<Url> {
        let base = format!("http://{}{}", self.addr, self.path);
        let invalid = |reason: String| CollectorError::Other(format!("invalid url {}: {}", base, reason));

        let mut url = Url::parse(&base).map_err(|e| invalid(e.to_string()))?;
        if !self.segments.is_empty() {
            url.path_segments_mut()
                .map_err(|_| invalid("cannot carry a path".to_string()))?
                .pop_if_empty()
                .extend(&self.segments);
        }
        if !self.params.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.params);
        }
        Ok(url)
    }
}

#[async_trait]
impl Collector for HttpCollector {
    fn name(&self) -> String {
        let segments: String = self.segments.iter().map(|s| format!("/{}", s)).collect();
        format!("{} http://{}{}{}", self.name, self.addr, self.path, segments)
    }

    async fn collect(&self) -> CollectorResult<Vec<u8>> {
        let url = self.url()?;
        debug!("GET {}", url);

        let mut request = self.client.get(url.clone());
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| {
            match (e.is_timeout(), self.timeout) {
                (true, Some(timeout)) => CollectorError::Timeout(timeout.as_secs()),
                _ => CollectorError::from(e),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollectorError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}
