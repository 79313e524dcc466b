pub mod inspect;
pub mod plan;

use anyhow::{Context, Result};

// Re-export handler functions for convenience
pub use inspect::handle_inspect_command;
pub use plan::handle_plan_command;

/// One client per run; discovery and every HTTP operation share its connection pool
fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .build()
        .context("Failed to build HTTP client")
}
