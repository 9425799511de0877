use clap::Parser;
use std::path::PathBuf;

/// ipmi-fand: temperature-driven fan control for IPMI management controllers
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// YAML or JSON config file path (default: search standard locations)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Send log output to syslog instead of stderr
    #[arg(long = "syslog", default_value = "false")]
    pub syslog: bool,

    /// Log fan commands instead of sending them
    #[arg(long = "dry-run", default_value = "false")]
    pub dry_run: bool,

    /// Enable debug logging
    #[arg(short = 'v', long = "verbose", default_value = "false")]
    pub verbose: bool,
}
