//! Pipe Relay node binary
//!
//! Runs one member of the relay cluster: serves reads for pipes held here
//! and forwards reads for pipes held elsewhere.

mod cli;

use clap::Parser;
use tracing::{error, info};

use pipe_relay::config::{self, RelayConfig};
use pipe_relay::error::{Error, Result};
use pipe_relay::{logging, version, RelayNode};

use crate::cli::{Cli, Commands, ConfigSubcommand};

fn main() {
    if let Err(e) = run() {
        eprint!("{}", e.format_for_terminal());
        std::process::exit(e.exit_code());
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments first (before logging, so we know verbosity)
    let cli = Cli::parse();

    let (config_path, bind, external_url) = match cli.command {
        Commands::Version => {
            version::print_version();
            return Ok(());
        }
        Commands::Config { subcommand } => {
            // Config commands use minimal logging
            logging::init_simple(tracing::Level::WARN)?;
            return handle_config_command(subcommand);
        }
        Commands::Run {
            config,
            bind,
            external_url,
        } => (config, bind, external_url),
    };

    let mut config = RelayConfig::load(config_path.as_deref())?;
    if let Some(bind) = bind {
        config.node.bind_address = bind;
    }
    if let Some(url) = external_url {
        config.node.external_url = url;
    }
    config.validate()?;

    // The guards must be kept alive for the lifetime of the program
    let _log_guards = logging::init_logging(&config.logging, cli.verbose, cli.quiet)?;

    let build = version::build_info();
    info!(
        version = %build.full_version(),
        target = %build.target,
        release = build.is_release(),
        "Starting pipe relay"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(config.worker_threads())
        .thread_name("pipe-relay")
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create async runtime: {}", e)))?;

    runtime.block_on(run_node(config))
}

async fn run_node(config: RelayConfig) -> Result<()> {
    let node = RelayNode::from_config(config)?;
    let listener = node.bind().await?;
    node.serve(listener, shutdown_signal()).await
}

/// Resolves on Ctrl-C
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, draining open reads"),
        Err(e) => {
            // Without a signal handler the node runs until killed
            error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

/// Handle configuration subcommands
fn handle_config_command(subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show { config } => {
            let cfg = RelayConfig::load(config.as_deref())?;
            println!("{}", toml::to_string_pretty(&cfg)?);
        }
        ConfigSubcommand::Init { path, force } => {
            let path = config::init_config(path.as_deref(), force)?;
            println!("Configuration file created: {}", path.display());
        }
        ConfigSubcommand::Validate { config } => {
            RelayConfig::load(config.as_deref())?;
            println!("Configuration is valid.");
        }
    }

    Ok(())
}
