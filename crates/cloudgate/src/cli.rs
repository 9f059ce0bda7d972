//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Cloudgate - resilient requests against the cloud API
#[derive(Parser, Debug)]
#[command(name = "cloudgate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors and print response bodies
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to config.yaml (defaults to ~/.cloudgate/config.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send one API request under the retry policy
    Request(RequestArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// HTTP method (GET, POST, PUT, DELETE, ...)
    pub method: String,

    /// Path relative to the API base URL, e.g. /linode/instances
    pub path: String,

    /// JSON request body
    #[arg(short, long)]
    pub data: Option<String>,

    /// Operation name used in logs and for per-operation retry settings
    #[arg(short, long, default_value = "request")]
    pub operation: String,

    /// Override the number of retries after the first attempt
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Override the per-attempt timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

// Config commands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration with the token redacted
    Show(ConfigShowArgs),

    /// Print the config file location
    Path,
}

#[derive(Args, Debug)]
pub struct ConfigShowArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
