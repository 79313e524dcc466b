use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::collectors::{CollectorResult, EnvCollector, JsonCollector, SharedJsonCollector};
use crate::output::JsonOutput;
use crate::topology::Topology;

use super::operation::Operation;
use super::options::InspectOptions;

/// Contents of `meta.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionMeta {
    pub cluster_name: String,
    pub create_time: DateTime<Utc>,
    pub inspect_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Snapshots of the run's inputs: `args.json`, `env.json`, `topology.json`
pub fn setup_ops(
    root: &Path,
    options: &InspectOptions,
    topology: &Topology,
) -> CollectorResult<Vec<Operation>> {
    Ok(vec![
        Operation::new(JsonCollector::new("arguments", options)?, JsonOutput::new(root.join("args.json"))),
        Operation::new(EnvCollector, JsonOutput::new(root.join("env.json"))),
        Operation::new(JsonCollector::new("topology", topology)?, JsonOutput::new(root.join("topology.json"))),
    ])
}

/// The `meta.json` writer. Its pre-hook stamps `end_time`, so the file
/// records when the run finished rather than when it was planned.
pub fn teardown_op(root: &Path, topology: &Topology, started: DateTime<Utc>) -> Operation {
    let meta = Arc::new(Mutex::new(InspectionMeta {
        cluster_name: topology.cluster_name.clone(),
        create_time: started,
        inspect_time: started,
        end_time: None,
    }));

    let stamp = Arc::clone(&meta);
    Operation::new(
        SharedJsonCollector::new("inspection metadata", meta),
        JsonOutput::new(root.join("meta.json")),
    )
    .with_pre_hook(move || {
        let mut meta = stamp
            .lock()
            .map_err(|e| anyhow::anyhow!("metadata lock poisoned: {}", e))?;
        meta.end_time = Some(Utc::now());
        Ok(())
    })
}
