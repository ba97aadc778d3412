//! CLI argument parsing using clap v4
//!
//! Defines the command-line interface for a relay node.

use clap::{Parser, Subcommand};

/// Pipe Relay - cluster node serving single-use byte pipes
///
/// Streams pipes held by this node to readers, and forwards reads for pipes
/// held elsewhere to the node that owns them.
#[derive(Parser, Debug)]
#[command(name = "pipe-relay")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the relay node until interrupted
    Run {
        /// Path to configuration file
        #[arg(short, long, env = "PIPE_RELAY_CONFIG")]
        config: Option<String>,

        /// Override the listen address (e.g. 0.0.0.0:8080)
        #[arg(long)]
        bind: Option<String>,

        /// Override the URL other nodes use to reach this one
        #[arg(long)]
        external_url: Option<String>,
    },

    /// Display version and build information
    Version,

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the current configuration
    Show {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: Option<String>,
    },
}
