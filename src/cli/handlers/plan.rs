use anyhow::{Context, Result};
use tracing::info;

use crate::cli::commands::InspectArgs;
use crate::cli::utils::print_plan;
use crate::plan::{HttpDiscovery, PlanBuilder};
use crate::topology::Topology;

use super::http_client;

/// Build the plan and print it. Discovery requests still go out, so the
/// listed metric and schema operations are the ones `inspect` would run.
pub async fn handle_plan_command(args: InspectArgs) -> Result<()> {
    let options = args.to_options();
    let topology = Topology::load(&args.topology)
        .with_context(|| format!("Failed to load topology from {}", args.topology.display()))?;

    let client = http_client()?;
    let discovery = HttpDiscovery::new(&client, options.http_timeout());
    let plan = PlanBuilder::new(&topology, &options, &discovery, &client)
        .build()
        .await
        .context("Failed to build inspection plan")?;

    info!("Dry run, nothing will be collected");
    print_plan(&plan);
    Ok(())
}
