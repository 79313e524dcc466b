use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::plan::{Category, OperationError};

/// Outcome of a whole group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupState {
    Success,
    Error,
}

/// One failed operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationFailure {
    pub operation: String,
    pub message: String,
    /// The operation stood in for a discovery step that failed while planning
    #[serde(default)]
    pub preparation: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupStatus {
    pub status: GroupState,
    pub total: usize,
    pub failed: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<OperationFailure>,
}

impl GroupStatus {
    pub fn new(total: usize) -> Self {
        Self {
            status: GroupState::Success,
            total,
            failed: 0,
            errors: Vec::new(),
        }
    }

    pub fn record_failure(&mut self, operation: impl Into<String>, error: &OperationError) {
        self.push(OperationFailure {
            operation: operation.into(),
            message: error.to_string(),
            preparation: error.is_preparation_failure(),
        });
    }

    /// A task that never reported back, e.g. because it panicked
    pub fn record_lost(&mut self, message: impl Into<String>) {
        self.push(OperationFailure {
            operation: "unknown".to_string(),
            message: message.into(),
            preparation: false,
        });
    }

    fn push(&mut self, failure: OperationFailure) {
        self.status = GroupState::Error;
        self.failed += 1;
        self.errors.push(failure);
    }

    pub fn succeeded(&self) -> usize {
        self.total.saturating_sub(self.failed)
    }
}

/// Contents of `status.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub inspection_id: String,
    pub started: DateTime<Utc>,
    pub finished: Option<DateTime<Utc>>,
    pub groups: BTreeMap<String, GroupStatus>,
}

impl StatusReport {
    pub fn new(inspection_id: impl Into<String>, started: DateTime<Utc>) -> Self {
        Self {
            inspection_id: inspection_id.into(),
            started,
            finished: None,
            groups: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, category: Category, status: GroupStatus) {
        self.groups.insert(category.to_string(), status);
    }

    pub fn group(&self, category: Category) -> Option<&GroupStatus> {
        self.groups.get(category.as_str())
    }

    pub fn total_operations(&self) -> usize {
        self.groups.values().map(|g| g.total).sum()
    }

    pub fn failed_operations(&self) -> usize {
        self.groups.values().map(|g| g.failed).sum()
    }

    pub fn is_success(&self) -> bool {
        self.groups.values().all(|g| g.status == GroupState::Success)
    }

    pub async fn save(&self, path: &Path) -> std::io::Result<()> {
        let data = serde_json::to_vec_pretty(self)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, data).await?;
        info!("Status report saved to {}", path.display());
        Ok(())
    }
}
