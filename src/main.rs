use anyhow::Result;
use clap::Parser;
use diagpilot::cli::commands::{Cli, Commands};
use diagpilot::cli::handlers::{handle_inspect_command, handle_plan_command};
use diagpilot::cli::utils::{init_logging, print_info};

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up DIAGPILOT_* settings from a local .env file
    let _ = dotenv::dotenv();

    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_format);

    match cli.command {
        Commands::Inspect(args) => handle_inspect_command(args).await,

        Commands::Plan(args) => handle_plan_command(args).await,

        Commands::Info => {
            print_info();
            Ok(())
        }
    }
}
