use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::process::Command;
use tracing::debug;

use super::{Collector, CollectorError, CollectorResult};

/// Run a program to completion and return its stdout, failing on a non-zero exit.
pub(crate) async fn run_command(program: &str, args: &[String]) -> CollectorResult<Vec<u8>> {
    let rendered = format!("{} {}", program, args.join(" "));
    debug!("Running {}", rendered);

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(CollectorError::CommandFailed {
            command: rendered,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output.stdout)
}

/// Runs a local program, e.g. the log spliter.
#[derive(Debug, Clone)]
pub struct CommandCollector {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandCollector {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

#[async_trait]
impl Collector for CommandCollector {
    fn name(&self) -> String {
        format!("exec {}", self.program.display())
    }

    async fn collect(&self) -> CollectorResult<Vec<u8>> {
        run_command(&self.program.to_string_lossy(), &self.args).await
    }
}

/// Serializes a value captured when the plan was built.
#[derive(Debug, Clone)]
pub struct JsonCollector {
    name: String,
    value: serde_json::Value,
}

impl JsonCollector {
    pub fn new<T: Serialize>(name: impl Into<String>, value: &T) -> CollectorResult<Self> {
        Ok(Self {
            name: name.into(),
            value: serde_json::to_value(value)?,
        })
    }
}

#[async_trait]
impl Collector for JsonCollector {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn collect(&self) -> CollectorResult<Vec<u8>> {
        Ok(serde_json::to_vec(&self.value)?)
    }
}

/// Serializes a shared value as it is at execution time, so earlier
/// steps (a pre-hook, for instance) can still change it after planning.
pub struct SharedJsonCollector<T> {
    name: String,
    value: Arc<Mutex<T>>,
}

impl<T> SharedJsonCollector<T> {
    pub fn new(name: impl Into<String>, value: Arc<Mutex<T>>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

#[async_trait]
impl<T: Serialize + Send> Collector for SharedJsonCollector<T> {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn collect(&self) -> CollectorResult<Vec<u8>> {
        let guard = self
            .value
            .lock()
            .map_err(|e| CollectorError::Other(format!("lock poisoned: {}", e)))?;
        Ok(serde_json::to_vec(&*guard)?)
    }
}

/// Snapshot of the process environment.
#[derive(Debug, Clone, Default)]
pub struct EnvCollector;

#[async_trait]
impl Collector for EnvCollector {
    fn name(&self) -> String {
        "environment".to_string()
    }

    async fn collect(&self) -> CollectorResult<Vec<u8>> {
        // non-UTF-8 entries are kept, lossily converted
        let env: BTreeMap<String, String> = std::env::vars_os()
            .map(|(key, value)| (key.to_string_lossy().into_owned(), value.to_string_lossy().into_owned()))
            .collect();
        Ok(serde_json::to_vec(&env)?)
    }
}

/// Stands in for a sub-plan whose discovery step failed.
#[derive(Debug, Clone)]
pub struct FailingCollector {
    name: String,
    cause: String,
}

impl FailingCollector {
    pub fn new(name: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cause: cause.into(),
        }
    }
}

#[async_trait]
impl Collector for FailingCollector {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn collect(&self) -> CollectorResult<Vec<u8>> {
        Err(CollectorError::PreparationFailed(self.cause.clone()))
    }
}
