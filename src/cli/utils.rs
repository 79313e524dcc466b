use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use super::commands::LogFormat;
use crate::archive::CollectionStats;
use crate::executor::{GroupState, StatusReport};
use crate::plan::Plan;

const TERMINAL_WIDTH: usize = 80;

pub fn init_logging(verbose: bool, log_format: LogFormat) {
    let env_filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let fmt_layer = match log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .boxed(),
        LogFormat::Text => fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .expect("Failed to initialize tracing subscriber");
}

pub fn print_info() {
    println!("DiagPilot v{}", env!("CARGO_PKG_VERSION"));
    println!("{}", env!("CARGO_PKG_DESCRIPTION"));
    println!();
    println!("Authors: {}", env!("CARGO_PKG_AUTHORS"));
    println!("License: {}", env!("CARGO_PKG_LICENSE"));
    println!();
    println!("For more information, visit: {}", env!("CARGO_PKG_REPOSITORY"));
}

/// Every group and the label of each of its operations
pub fn print_plan(plan: &Plan) {
    println!(
        "\n{} {}",
        "📋 Inspection plan".bright_white().bold(),
        plan.inspection_id().bright_black()
    );
    println!("{}", "═".repeat(TERMINAL_WIDTH).bright_black());

    for group in plan.groups() {
        let header = format!("{} ({})", group.name(), group.len());
        if group.is_empty() {
            println!("\n{}", header.bright_black());
            continue;
        }
        println!("\n{}", header.bright_cyan().bold());
        for op in group.operations() {
            println!("  • {}", op.label());
        }
    }

    println!("\nTotal operations: {}", plan.total_operations());
}

pub fn print_summary(report: &StatusReport, stats: &CollectionStats) {
    println!("\n{}", "📊 Inspection summary".bright_white().bold());
    println!("{}", "═".repeat(TERMINAL_WIDTH).bright_black());

    for (name, group) in &report.groups {
        let state = match group.status {
            GroupState::Success => "success".bright_green(),
            GroupState::Error => "error".bright_red(),
        };
        println!("  {:<12} {:<8} {}/{} ok", name, state, group.succeeded(), group.total);
        for failure in &group.errors {
            println!("    {} {}", "✗".bright_red(), failure.operation);
            println!("      {}", failure.message.bright_yellow());
        }
    }

    println!();
    println!("  Files written: {}", stats.total_files);
    println!("  Total size:    {} bytes", stats.total_size_bytes);
    println!("  Duration:      {}s", stats.duration_secs);

    if report.is_success() {
        println!("\n✅ {}", "All operations succeeded".bright_green());
    } else {
        println!(
            "\n⚠️  {}",
            format!("{} of {} operations failed", report.failed_operations(), report.total_operations()).bright_yellow()
        );
    }
}
