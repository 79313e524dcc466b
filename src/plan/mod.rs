//! Turns a cluster topology and a target spec into groups of collection operations.

pub mod basic;
pub mod builder;
pub mod config;
pub mod dbinfo;
pub mod discovery;
pub mod duration;
pub mod logs;
pub mod meta;
pub mod metric;
pub mod operation;
pub mod options;
pub mod profile;
pub mod target;

use std::collections::BTreeMap;
use std::fmt;

pub use builder::{PlanBuilder, PlanError};
pub use discovery::{Discovery, HttpDiscovery, PreparationError};
pub use duration::{parse_duration, DurationError, DurationInput};
pub use operation::{Operation, OperationError, OperationGroup};
pub use options::InspectOptions;
pub use target::{TargetError, TargetOption, TargetSpec};

/// Collection categories, in the order their groups are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Setup,
    Basic,
    Profile,
    Metric,
    Config,
    DbInfo,
    Log,
    Teardown,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Setup,
        Category::Basic,
        Category::Profile,
        Category::Metric,
        Category::Config,
        Category::DbInfo,
        Category::Log,
        Category::Teardown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Setup => "_setup",
            Category::Basic => "basic",
            Category::Profile => "profile",
            Category::Metric => "metric",
            Category::Config => "config",
            Category::DbInfo => "dbinfo",
            Category::Log => "log",
            Category::Teardown => "_teardown",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `ip:port`, or the bare ip for services without a known port
pub(crate) fn component_addr(ip: &str, port: Option<u16>) -> String {
    match port {
        Some(port) => format!("{}:{}", ip, port),
        None => ip.to_string(),
    }
}

/// Every operation of one inspection run, bucketed by category.
///
/// All canonical groups exist from construction on, so consumers can rely on
/// the shape of the plan regardless of which categories were requested.
pub struct Plan {
    inspection_id: String,
    groups: BTreeMap<Category, OperationGroup>,
}

impl Plan {
    pub fn new(inspection_id: impl Into<String>) -> Self {
        let groups = Category::ALL
            .into_iter()
            .map(|c| (c, OperationGroup::new(c)))
            .collect();
        Self {
            inspection_id: inspection_id.into(),
            groups,
        }
    }

    pub fn inspection_id(&self) -> &str {
        &self.inspection_id
    }

    pub fn group(&self, category: Category) -> &OperationGroup {
        // every category is inserted by `new` and never removed
        &self.groups[&category]
    }

    pub fn group_mut(&mut self, category: Category) -> &mut OperationGroup {
        self.groups
            .entry(category)
            .or_insert_with(|| OperationGroup::new(category))
    }

    /// Groups in execution order
    pub fn groups(&self) -> impl Iterator<Item = &OperationGroup> {
        self.groups.values()
    }

    pub fn into_groups(self) -> Vec<OperationGroup> {
        self.groups.into_values().collect()
    }

    pub fn total_operations(&self) -> usize {
        self.groups.values().map(OperationGroup::len).sum()
    }
}
