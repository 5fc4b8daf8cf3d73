pub mod toml_config;

#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "small-volume-transfer")]
#[command(about = "Run a table-driven liquid transfer protocol on a simulated robot")]
pub struct CliConfig {
    /// Protocol TOML file; the built-in protocol runs when omitted
    #[arg(short, long)]
    pub config: Option<String>,

    /// Directory for run_report.json
    #[arg(short, long)]
    pub output_path: Option<String>,

    /// Fetch and parse the tables, print the plan, touch nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}
