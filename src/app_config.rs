//! Command-line interface definition and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Command-line interface for perfwatch
#[derive(Parser)]
#[command(name = "perfwatch")]
#[command(about = "Adaptive resource and performance health monitor")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long, env = "PERFWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Monitor this process until interrupted
    Run {
        /// How often to print a status summary
        #[arg(long, default_value = "30s", value_parser = parse_duration)]
        report_every: Duration,
    },

    /// Take one sample and print the status report as JSON
    Status,

    /// Print the effective configuration as TOML
    Config,

    /// Check that the configuration loads and validates
    Validate,
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Run { .. } => "run",
            Commands::Status => "status",
            Commands::Config => "config",
            Commands::Validate => "validate",
        }
    }
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(value).map_err(|e| e.to_string())
}
