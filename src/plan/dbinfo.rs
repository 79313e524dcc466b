use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use crate::collectors::HttpCollector;
use crate::output::FileOutput;

use super::discovery::{Discovery, PreparationError};
use super::operation::Operation;

/// A database name usable as a single file name under `dbinfo/`
fn is_safe_name(db: &str) -> bool {
    !db.is_empty() && !db.starts_with('.') && !db.contains(['/', '\\', '\0'])
}

/// One schema dump per database, fetched from a TiDB status server into `dbinfo/{db}.json`.
///
/// Names that would escape `dbinfo/` as a file name are skipped.
pub async fn schema_ops(
    client: &Client,
    discovery: &dyn Discovery,
    root: &Path,
    status_addr: &str,
    timeout: Duration,
) -> Result<Vec<Operation>, PreparationError> {
    let databases = discovery.list_databases(status_addr).await?;
    debug!("Collecting schema of {} databases via {}", databases.len(), status_addr);

    let dir = root.join("dbinfo");
    Ok(databases
        .iter()
        .filter(|db| {
            let safe = is_safe_name(db);
            if !safe {
                warn!("Skipping schema of database {:?}: not usable as a file name", db);
            }
            safe
        })
        .map(|db| {
            let collector = HttpCollector::new(client, db.as_str(), status_addr, "/schema")
                .with_segment(db.as_str())
                .with_timeout(timeout);
            Operation::new(collector, FileOutput::new(dir.join(format!("{}.json", db))))
        })
        .collect())
}
