use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::plan::options::{DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_PROFILE_SECONDS};
use crate::plan::InspectOptions;

#[derive(Parser, Debug)]
#[command(
    name = "diagpilot",
    about = "Diagnostic artifact collector for TiDB clusters",
    version,
    author
)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format for logs
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect diagnostics from a cluster into an inspection directory
    Inspect(InspectArgs),

    /// Print the operations an inspection would run, without running them
    Plan(InspectArgs),

    /// Show information about DiagPilot
    Info,
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    /// Identifier of this run, also the name of its output directory
    #[arg(long, env = "DIAGPILOT_INSPECTION_ID")]
    pub inspection_id: Option<String>,

    /// Directory inspections are written under (default: ~/.diagpilot/inspection)
    #[arg(long, env = "DIAGPILOT_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Topology file (JSON or YAML) describing hosts and components
    #[arg(short, long, env = "DIAGPILOT_TOPOLOGY")]
    pub topology: PathBuf,

    /// What to collect, e.g. "basic,config,profile,metric:2h,dbinfo"
    #[arg(short, long, default_value = "basic,config,profile,metric,dbinfo")]
    pub collect: String,

    /// Start of the metric and log window (RFC 3339)
    #[arg(long)]
    pub begin: Option<DateTime<Utc>>,

    /// End of the metric and log window (RFC 3339)
    #[arg(long)]
    pub end: Option<DateTime<Utc>>,

    /// Directory holding gathered remote logs, required by the log target
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Log spliter executable, required by the log target
    #[arg(long, env = "DIAGPILOT_LOG_SPLITER")]
    pub log_spliter: Option<PathBuf>,

    /// Seconds to sample CPU profiles, traces and perf recordings
    #[arg(long, default_value_t = DEFAULT_PROFILE_SECONDS)]
    pub profile_seconds: u64,

    /// Timeout in seconds for plain HTTP collection
    #[arg(long, default_value_t = DEFAULT_HTTP_TIMEOUT_SECS)]
    pub http_timeout: u64,

    /// Maximum operations running at once within a group (default: available parallelism)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Pack the inspection directory into a .tar.gz when done
    #[arg(long)]
    pub archive: bool,
}

impl InspectArgs {
    pub fn to_options(&self) -> InspectOptions {
        let inspection_id = self
            .inspection_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let data_dir = self.data_dir.clone().unwrap_or_else(default_data_dir);

        let mut options = InspectOptions::new(inspection_id, data_dir, self.collect.clone())
            .with_profile_seconds(self.profile_seconds);
        options.begin = self.begin;
        options.end = self.end;
        options.log_dir = self.log_dir.clone();
        options.log_spliter = self.log_spliter.clone();
        options.http_timeout_secs = self.http_timeout;
        options
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".diagpilot")
        .join("inspection")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}
