//! Runs a plan: groups one after another, operations inside a group concurrently.

pub mod status;

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::plan::{OperationGroup, Plan};

pub use status::{GroupState, GroupStatus, OperationFailure, StatusReport};

/// Name of the status report inside the inspection directory
pub const STATUS_FILE: &str = "status.json";

pub struct Executor {
    concurrency: usize,
    show_progress: bool,
}

impl Executor {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    fn progress_bar(&self, total: usize) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }
        let bar = ProgressBar::new(total as u64);
        match ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>4}/{len:4} {msg}")
        {
            Ok(style) => bar.set_style(style.progress_chars("##-")),
            Err(e) => debug!("Falling back to default progress style: {}", e),
        }
        Some(bar)
    }

    /// Run every operation. Failures are recorded, never fatal.
    pub async fn run(&self, plan: Plan) -> StatusReport {
        let mut report = StatusReport::new(plan.inspection_id(), Utc::now());
        let total = plan.total_operations();
        info!(
            "Executing {} operations of inspection {} with concurrency {}",
            total,
            plan.inspection_id(),
            self.concurrency
        );

        let bar = self.progress_bar(total);
        for group in plan.into_groups() {
            if group.is_empty() {
                continue;
            }
            let category = group.category();
            if let Some(bar) = &bar {
                bar.set_message(category.to_string());
            }
            let status = self.run_group(group, bar.as_ref()).await;
            info!(
                "Group {}: {}/{} operations succeeded",
                category,
                status.succeeded(),
                status.total
            );
            report.insert(category, status);
        }
        if let Some(bar) = &bar {
            bar.finish_with_message("done");
        }

        report.finished = Some(Utc::now());
        report
    }

    async fn run_group(&self, group: OperationGroup, bar: Option<&ProgressBar>) -> GroupStatus {
        let category = group.category();
        let mut status = GroupStatus::new(group.len());
        let permits = Arc::new(Semaphore::new(self.concurrency));

        let mut tasks = JoinSet::new();
        for op in group.into_operations() {
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                // the semaphore is never closed
                let _permit = permits.acquire_owned().await;
                let label = op.label();
                debug!("Running {}", label);
                let result = op.run().await;
                (label, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((label, Ok(()))) => debug!("Finished {}", label),
                Ok((label, Err(e))) => {
                    warn!("[{}] {} failed: {}", category, label, e);
                    status.record_failure(label, &e);
                }
                Err(e) => {
                    error!("[{}] operation task did not complete: {}", category, e);
                    status.record_lost(e.to_string());
                }
            }
            if let Some(bar) = bar {
                bar.inc(1);
            }
        }

        status
    }
}

impl Default for Executor {
    fn default() -> Self {
        let concurrency = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self::new(concurrency)
    }
}
