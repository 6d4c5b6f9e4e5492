//! CLI subcommand definitions and handlers.
//!
//! Every subcommand follows the same shape: resolve targets, build a
//! [`Tapper`](crate::tapper::Tapper) from the loaded files, scan, then run
//! one procedure over the discovered devices:
//! - `tapper dump` - list devices
//! - `tapper version` - check firmware
//! - `tapper config|secure|deploy|update|reboot` - change devices

mod dump;
mod procedures;
mod session;

pub use dump::DumpCommand;
pub use procedures::{ConfigCommand, DeployCommand, SecureCommand};
pub use session::Session;

use crate::error::CliResult;
use crate::procedure;
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tapper - discover and manage fleets of HTTP IoT appliances.
///
/// Probes every target address for a supported device, then applies one
/// operation to all of them in parallel.
#[derive(Parser, Debug)]
#[command(name = "tapper")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Discover and manage IoT appliances on a local network", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub globals: GlobalArgs,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Addresses to probe: IPs, CIDR ranges or hostnames (repeatable, comma-separated)
    ///
    /// Examples:
    ///   192.168.1.20       Single IP address
    ///   192.168.1.0/24     CIDR range (network and broadcast skipped)
    ///   plug.lan           Hostname
    #[arg(short = 't', long = "target", value_name = "TARGET", global = true, env = "TAPPER_TARGETS")]
    pub targets: Vec<String>,

    /// Credentials file used to answer authentication challenges
    #[arg(long, value_name = "FILE", global = true, env = "TAPPER_CREDENTIALS")]
    pub credentials: Option<PathBuf>,

    /// Settings file (defaults to the XDG config location)
    #[arg(long, value_name = "FILE", global = true)]
    pub settings: Option<PathBuf>,

    /// Probe timeout in milliseconds
    #[arg(long, value_name = "MS", global = true)]
    pub probe_timeout: Option<u64>,

    /// Output format for results
    #[arg(short, long, value_enum, global = true)]
    pub output: Option<OutputFormat>,

    /// Enable verbose logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan and list discovered devices
    #[command(alias = "ls")]
    Dump(DumpCommand),

    /// Apply a driver configuration file
    Config(ConfigCommand),

    /// Enable authentication on every device
    Secure(SecureCommand),

    /// Install scripts from a deployment file
    Deploy(DeployCommand),

    /// Start a firmware update
    Update,

    /// Reboot every device
    Reboot,

    /// Check installed and available firmware
    Version,
}

impl Cli {
    /// Run the selected subcommand.
    pub async fn run(self) -> CliResult<()> {
        let session = Session::open(&self.globals).await?;

        match self.command {
            Commands::Dump(cmd) => cmd.execute(&session).await,
            Commands::Config(cmd) => cmd.execute(&session).await,
            Commands::Secure(cmd) => cmd.execute(&session).await,
            Commands::Deploy(cmd) => cmd.execute(&session).await,
            Commands::Update => {
                procedures::run(&session, session.tapper()?, "update", procedure::update).await
            }
            Commands::Reboot => {
                procedures::run(&session, session.tapper()?, "reboot", procedure::reboot).await
            }
            Commands::Version => dump::versions(&session).await,
        }
    }
}

/// Output format for results.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable plain text
    #[default]
    Plain,
    /// JSON structured output
    Json,
    /// CSV format for data analysis
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}
