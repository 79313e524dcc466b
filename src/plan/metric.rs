use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::collectors::HttpCollector;
use crate::output::FileOutput;

use super::discovery::{Discovery, PreparationError};
use super::duration::{parse_duration, DurationError};
use super::operation::Operation;
use super::options::InspectOptions;
use super::target::TargetOption;

/// Finest resolution Prometheus scrapes at
pub const MIN_STEP_SECS: u64 = 15;

/// Roughly how many samples each exported series should have
pub const TARGET_POINTS: u64 = 60;

/// Window used when neither absolute bounds nor a duration were given
pub const DEFAULT_DURATION: &str = "1h";

/// Pseudo-metric carrying firing alerts, exported through its own query
pub const ALERT_METRIC: &str = "ALERTS";

/// `max(15, span / 60)`: about sixty points per series, never finer than a scrape
pub fn compute_step(span_secs: i64) -> u64 {
    let span = u64::try_from(span_secs).unwrap_or(0);
    (span / TARGET_POINTS).max(MIN_STEP_SECS)
}

/// Time range and resolution of a metric export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricWindow {
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub step: u64,
}

impl MetricWindow {
    pub fn new(begin: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            begin,
            end,
            step: compute_step((end - begin).num_seconds()),
        }
    }

    /// The `seconds` leading up to `now`
    pub fn relative(now: DateTime<Utc>, seconds: u64) -> Self {
        let seconds = i64::try_from(seconds).unwrap_or(i64::MAX);
        let begin = ChronoDuration::try_seconds(seconds)
            .and_then(|span| now.checked_sub_signed(span))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self::new(begin, now)
    }

    /// Absolute `begin`/`end` arguments win; otherwise a `metric:<duration>`
    /// option, otherwise the default hour, anchored at `now`.
    pub fn resolve(
        option: Option<&TargetOption>,
        options: &InspectOptions,
        now: DateTime<Utc>,
    ) -> Result<Self, DurationError> {
        if let (Some(begin), Some(end)) = (options.begin, options.end) {
            return Ok(Self::new(begin, end));
        }
        let duration = match option {
            Some(TargetOption::Value(duration)) => duration.as_str(),
            _ => DEFAULT_DURATION,
        };
        Ok(Self::relative(now, parse_duration(duration)?))
    }

    pub fn span_secs(&self) -> i64 {
        (self.end - self.begin).num_seconds()
    }

    /// `{metric}_{begin}_to_{end}_{step}s.json`, unique per metric and window
    pub fn file_name(&self, metric: &str) -> String {
        format!(
            "{}_{}_to_{}_{}s.json",
            metric,
            self.begin.timestamp(),
            self.end.timestamp(),
            self.step
        )
    }
}

fn range_query_op(
    client: &Client,
    root: &Path,
    prometheus_addr: &str,
    metric: &str,
    window: &MetricWindow,
    timeout: Duration,
) -> Operation {
    let collector = HttpCollector::new(client, metric, prometheus_addr, "/api/v1/query_range")
        .with_param("query", metric)
        .with_param("start", window.begin.timestamp())
        .with_param("end", window.end.timestamp())
        .with_param("step", window.step)
        .with_timeout(timeout);
    Operation::new(collector, FileOutput::new(root.join("metric").join(window.file_name(metric))))
}

/// Currently firing alerts, written to `metric/alert.json`
pub fn alert_op(client: &Client, root: &Path, prometheus_addr: &str, timeout: Duration) -> Operation {
    let collector = HttpCollector::new(client, "alerts", prometheus_addr, "/api/v1/query")
        .with_param("query", ALERT_METRIC)
        .with_timeout(timeout);
    Operation::new(collector, FileOutput::new(root.join("metric").join("alert.json")))
}

/// One range export per metric Prometheus knows about
pub async fn metric_ops(
    client: &Client,
    discovery: &dyn Discovery,
    root: &Path,
    prometheus_addr: &str,
    window: &MetricWindow,
    timeout: Duration,
) -> Result<Vec<Operation>, PreparationError> {
    let metrics = discovery.list_metrics(prometheus_addr).await?;
    debug!(
        "Exporting {} metrics from {} with step {}s",
        metrics.len(),
        prometheus_addr,
        window.step
    );

    Ok(metrics
        .iter()
        .filter(|m| m.as_str() != ALERT_METRIC)
        .map(|m| range_query_op(client, root, prometheus_addr, m, window, timeout))
        .collect())
}
