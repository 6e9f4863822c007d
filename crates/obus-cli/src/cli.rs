use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use obus_conf::Role;

#[derive(Parser)]
#[command(
    name = "obus",
    about = "OBus: inspect message bus configuration",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (defaults to obus.conf, or obusd.conf with --daemon)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Host to use instead of the configured one
    #[arg(short = 'H', long, global = true)]
    pub host: Option<String>,

    /// Port to use instead of the configured one
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Resolve settings for the daemon rather than a client
    #[arg(long, global = true)]
    pub daemon: bool,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

impl Cli {
    pub fn role(&self) -> Role {
        if self.daemon {
            Role::Daemon
        } else {
            Role::Client
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from(self.role().default_config_file()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Load the configuration file and report whether it is usable
    Check,
    /// Print a single entry
    Get(KeyArgs),
    /// Report whether a key is configured
    Has(KeyArgs),
    /// List configured keys
    Keys,
    /// Print every entry
    Dump,
    /// Show the resolved host, port, and endpoints
    Settings,
}

#[derive(Args)]
pub struct KeyArgs {
    pub key: String,
}
