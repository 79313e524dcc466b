use std::fmt;

use crate::collectors::{BoxedCollector, Collector, CollectorError};
use crate::output::{BoxedOutput, OutputError, OutputSink};

use super::Category;

/// Action run right before collecting, e.g. stamping a timestamp
pub type PreHook = Box<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// Failure of a single operation. Never fatal to the run as a whole.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error("pre-hook failed: {0}")]
    PreHook(String),

    #[error(transparent)]
    Collection(#[from] CollectorError),

    #[error(transparent)]
    Output(#[from] OutputError),
}

impl OperationError {
    /// The operation stands in for a sub-plan whose discovery step failed
    pub fn is_preparation_failure(&self) -> bool {
        matches!(self, OperationError::Collection(CollectorError::PreparationFailed(_)))
    }
}

/// One collector bound to one output sink.
pub struct Operation {
    collector: BoxedCollector,
    output: BoxedOutput,
    pre_hook: Option<PreHook>,
}

impl Operation {
    pub fn new(collector: impl Collector + 'static, output: impl OutputSink + 'static) -> Self {
        Self {
            collector: Box::new(collector),
            output: Box::new(output),
            pre_hook: None,
        }
    }

    pub fn with_pre_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.pre_hook = Some(Box::new(hook));
        self
    }

    pub fn has_pre_hook(&self) -> bool {
        self.pre_hook.is_some()
    }

    pub fn label(&self) -> String {
        format!("{} -> {}", self.collector.name(), self.output.describe())
    }

    /// Run the pre-hook, collect, and hand the bytes to the sink.
    /// Errors from any of the three steps are returned as-is.
    pub async fn run(&self) -> Result<(), OperationError> {
        if let Some(hook) = &self.pre_hook {
            hook().map_err(|e| OperationError::PreHook(format!("{:#}", e)))?;
        }
        let data = self.collector.collect().await?;
        self.output.output(&data).await?;
        Ok(())
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("collector", &self.collector.name())
            .field("output", &self.output.describe())
            .field("pre_hook", &self.pre_hook.is_some())
            .finish()
    }
}

/// Operations of one category, kept in insertion order.
#[derive(Debug)]
pub struct OperationGroup {
    category: Category,
    operations: Vec<Operation>,
}

impl OperationGroup {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            operations: Vec::new(),
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn name(&self) -> &'static str {
        self.category.as_str()
    }

    pub fn add_op(&mut self, op: Operation) {
        self.operations.push(op);
    }

    pub fn add_ops(&mut self, ops: impl IntoIterator<Item = Operation>) {
        self.operations.extend(ops);
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn into_operations(self) -> Vec<Operation> {
        self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::{CollectorResult, FailingCollector};
    use crate::output::{DiscardOutput, FileOutput, OutputResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    struct StaticCollector(&'static [u8]);

    #[async_trait]
    impl Collector for StaticCollector {
        fn name(&self) -> String {
            "static".to_string()
        }

        async fn collect(&self) -> CollectorResult<Vec<u8>> {
            Ok(self.0.to_vec())
        }
    }

    struct RecordingOutput(Arc<Mutex<Vec<u8>>>);

    #[async_trait]
    impl OutputSink for RecordingOutput {
        fn describe(&self) -> String {
            "memory".to_string()
        }

        async fn output(&self, data: &[u8]) -> OutputResult<()> {
            self.0.lock().unwrap().extend_from_slice(data);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_run_passes_bytes_to_output() {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let op = Operation::new(StaticCollector(b"payload"), RecordingOutput(Arc::clone(&sink)));
        op.run().await.unwrap();
        assert_eq!(*sink.lock().unwrap(), b"payload");
        assert_eq!(op.label(), "static -> memory");
    }

    #[tokio::test]
    async fn test_pre_hook_runs_before_collect() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let op = Operation::new(StaticCollector(b""), DiscardOutput).with_pre_hook(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert!(op.has_pre_hook());
        op.run().await.unwrap();
        op.run().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_pre_hook_error_stops_the_operation() {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let op = Operation::new(StaticCollector(b"data"), RecordingOutput(Arc::clone(&sink)))
            .with_pre_hook(|| Err(anyhow::anyhow!("clock unavailable")));
        let err = op.run().await.unwrap_err();
        assert!(matches!(err, OperationError::PreHook(ref msg) if msg == "clock unavailable"));
        assert!(sink.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_collection_and_output_errors_propagate() {
        let op = Operation::new(FailingCollector::new("dbinfo", "refused"), DiscardOutput);
        let err = op.run().await.unwrap_err();
        assert!(err.is_preparation_failure());

        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        // the parent of the target is a regular file, so the write must fail
        let op = Operation::new(StaticCollector(b"data"), FileOutput::new(blocker.join("child.txt")));
        let err = op.run().await.unwrap_err();
        assert!(matches!(err, OperationError::Output(OutputError::Write { .. })));
        assert!(!err.is_preparation_failure());
    }

    #[test]
    fn test_groups_do_not_share_storage() {
        let mut a = OperationGroup::new(Category::Basic);
        let b = OperationGroup::new(Category::Basic);
        a.add_ops(Vec::new());
        assert!(a.is_empty());
        a.add_op(Operation::new(StaticCollector(b"1"), DiscardOutput));
        a.add_ops(vec![
            Operation::new(StaticCollector(b"2"), DiscardOutput),
            Operation::new(StaticCollector(b"3"), DiscardOutput),
        ]);
        assert_eq!(a.len(), 3);
        assert!(b.is_empty());
        assert_eq!(a.name(), "basic");
    }
}
