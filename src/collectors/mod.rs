pub mod http;
pub mod local;
pub mod ssh;

use async_trait::async_trait;

pub use http::HttpCollector;
pub use local::{CommandCollector, EnvCollector, FailingCollector, JsonCollector, SharedJsonCollector};
pub use ssh::SshCollector;

/// Result type for collector operations
pub type CollectorResult<T> = Result<T, CollectorError>;

/// Errors that can occur during collection
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Collection timeout after {0} seconds")]
    Timeout(u64),

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Command `{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Preparation failed: {0}")]
    PreparationFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for CollectorError {
    fn from(err: reqwest::Error) -> Self {
        CollectorError::ConnectionFailed(err.to_string())
    }
}

/// A source of raw diagnostic bytes: an HTTP endpoint, a remote command, a local value.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Short human readable description, used in logs and the status report
    fn name(&self) -> String;

    /// Fetch the bytes from the source
    async fn collect(&self) -> CollectorResult<Vec<u8>>;
}

/// Type alias for boxed collectors to simplify type signatures
pub type BoxedCollector = Box<dyn Collector>;
