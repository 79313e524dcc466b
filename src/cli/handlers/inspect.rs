use anyhow::{Context, Result};
use std::time::Instant;
use tracing::info;

use crate::archive::{create_archive, CollectionStats};
use crate::cli::commands::InspectArgs;
use crate::cli::utils::print_summary;
use crate::executor::{Executor, STATUS_FILE};
use crate::plan::{HttpDiscovery, PlanBuilder};
use crate::topology::Topology;

use super::http_client;

pub async fn handle_inspect_command(args: InspectArgs) -> Result<()> {
    let options = args.to_options();
    let topology = Topology::load(&args.topology)
        .with_context(|| format!("Failed to load topology from {}", args.topology.display()))?;
    info!(
        "Starting inspection {} of cluster '{}'",
        options.inspection_id, topology.cluster_name
    );

    let started = Instant::now();
    let client = http_client()?;
    let discovery = HttpDiscovery::new(&client, options.http_timeout());
    let plan = PlanBuilder::new(&topology, &options, &discovery, &client)
        .build()
        .await
        .context("Failed to build inspection plan")?;

    let executor = args
        .concurrency
        .map(Executor::new)
        .unwrap_or_default()
        .with_progress(true);
    let report = executor.run(plan).await;

    let root = options.inspection_dir();
    report
        .save(&root.join(STATUS_FILE))
        .await
        .context("Failed to write status report")?;

    let stats = CollectionStats::gather(&root, started.elapsed().as_secs());
    print_summary(&report, &stats);

    if args.archive {
        let path = create_archive(&root).context("Failed to archive inspection")?;
        println!("\nArchive: {}", path.display());
    }

    info!(
        "Inspection {} finished, results in {}",
        options.inspection_id,
        root.display()
    );
    Ok(())
}
