use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default sampling time for CPU profiles and `perf record`
pub const DEFAULT_PROFILE_SECONDS: u64 = 10;

/// Default timeout for plain HTTP collection
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Slack on top of a sampling period before a profile request times out
const PROFILE_GRACE_SECS: u64 = 10;

/// Arguments of one inspection run. Serialized verbatim into `args.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectOptions {
    pub inspection_id: String,
    pub data_dir: PathBuf,
    /// Target spec, e.g. `basic,profile,metric:1h`
    pub collect: String,
    pub begin: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub log_dir: Option<PathBuf>,
    pub log_spliter: Option<PathBuf>,
    pub profile_seconds: u64,
    pub http_timeout_secs: u64,
}

impl InspectOptions {
    pub fn new(
        inspection_id: impl Into<String>,
        data_dir: impl Into<PathBuf>,
        collect: impl Into<String>,
    ) -> Self {
        Self {
            inspection_id: inspection_id.into(),
            data_dir: data_dir.into(),
            collect: collect.into(),
            begin: None,
            end: None,
            log_dir: None,
            log_spliter: None,
            profile_seconds: DEFAULT_PROFILE_SECONDS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }

    pub fn with_window(mut self, begin: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.begin = Some(begin);
        self.end = Some(end);
        self
    }

    pub fn with_log_source(mut self, log_dir: impl Into<PathBuf>, spliter: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(log_dir.into());
        self.log_spliter = Some(spliter.into());
        self
    }

    pub fn with_profile_seconds(mut self, seconds: u64) -> Self {
        self.profile_seconds = seconds;
        self
    }

    /// `{data_dir}/{inspection_id}`, the root of everything this run writes
    pub fn inspection_dir(&self) -> PathBuf {
        self.data_dir.join(&self.inspection_id)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Timeout for a request that blocks for `profile_seconds` before answering
    pub fn profile_timeout(&self) -> Duration {
        Duration::from_secs(self.profile_seconds.saturating_add(PROFILE_GRACE_SECS))
    }
}
