use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Result type for output sinks
pub type OutputResult<T> = Result<T, OutputError>;

/// Errors that can occur while persisting collected bytes
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Collected data for {path} is not valid JSON: {source}")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Destination for the bytes a collector produced.
#[async_trait]
pub trait OutputSink: Send + Sync {
    /// Where the bytes go, for logs and the status report
    fn describe(&self) -> String;

    async fn output(&self, data: &[u8]) -> OutputResult<()>;
}

/// Type alias for boxed sinks
pub type BoxedOutput = Box<dyn OutputSink>;

async fn write_file(path: &Path, data: &[u8]) -> OutputResult<()> {
    let wrap = |source| OutputError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(wrap)?;
    }
    tokio::fs::write(path, data).await.map_err(wrap)?;
    debug!("Wrote {} bytes to {}", data.len(), path.display());
    Ok(())
}

/// Raw passthrough to a file, creating parent directories as needed.
#[derive(Debug, Clone)]
pub struct FileOutput {
    path: PathBuf,
}

impl FileOutput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl OutputSink for FileOutput {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn output(&self, data: &[u8]) -> OutputResult<()> {
        write_file(&self.path, data).await
    }
}

/// Checks the bytes are JSON and writes them pretty-printed.
#[derive(Debug, Clone)]
pub struct JsonOutput {
    path: PathBuf,
}

impl JsonOutput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl OutputSink for JsonOutput {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn output(&self, data: &[u8]) -> OutputResult<()> {
        let invalid = |source| OutputError::InvalidJson {
            path: self.path.clone(),
            source,
        };
        let value: serde_json::Value = serde_json::from_slice(data).map_err(invalid)?;
        let pretty = serde_json::to_vec_pretty(&value).map_err(invalid)?;
        write_file(&self.path, &pretty).await
    }
}

/// Drops the bytes, for collectors that persist their results themselves.
#[derive(Debug, Clone, Default)]
pub struct DiscardOutput;

#[async_trait]
impl OutputSink for DiscardOutput {
    fn describe(&self) -> String {
        "discard".to_string()
    }

    async fn output(&self, _data: &[u8]) -> OutputResult<()> {
        Ok(())
    }
}
