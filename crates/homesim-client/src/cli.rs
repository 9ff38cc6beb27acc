//! Command-line interface definition.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use homesim_core::TracingOutputFormat;

/// homesim - smart-home device emulator
#[derive(Debug, Parser)]
#[command(name = "homesim")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "HOMESIM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Log output format (pretty, compact, json)
    #[arg(long, env = "HOMESIM_LOG_FORMAT", default_value = "compact")]
    pub log_format: TracingOutputFormat,

    /// Backend host (overrides the config file)
    #[arg(long, env = "HOMESIM_HOST")]
    pub host: Option<String>,

    /// Backend port (overrides the config file)
    #[arg(long, short, env = "HOMESIM_PORT")]
    pub port: Option<u16>,

    #[command(subcommand)]
    pub command: Command,
}

/// Device capabilities addressable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Device {
    AirPurifier,
    RoomAirConditioner,
    Window,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the backend simulator in the foreground
    Serve {
        /// Listen address
        #[arg(long, env = "HOMESIM_BIND", default_value = "127.0.0.1:33000")]
        bind: SocketAddr,

        /// Report the device as commissioned
        #[arg(long)]
        commissioned: bool,
    },

    /// Read a device state and print `{status, reply}`
    Get {
        device: Device,

        /// Get method to call instead of the aggregate state getter
        #[arg(long, short)]
        method: Option<String>,
    },

    /// Write a partial device state given as JSON
    Set {
        device: Device,

        /// Partial state, e.g. '{"OnOff": {"OnOff": true}}'
        state: String,

        /// Set method to call instead of the aggregate state setter
        #[arg(long, short)]
        method: Option<String>,
    },

    /// Poll a device and print every field change
    Watch {
        device: Device,

        /// Poll interval in milliseconds (overrides the config file)
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Exit after this many change events
        #[arg(long)]
        count: Option<usize>,
    },

    /// Push the reference initial state of a device
    Init { device: Device },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}
