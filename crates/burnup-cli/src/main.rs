use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use burnup_cli::commands::{events, hierarchies, history};
use burnup_cli::{Cli, Commands, Config};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose/debug flag support
    let filter = if cli.debug {
        EnvFilter::new("trace")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr; stdout carries command output.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        // No subcommand, show help
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let full_chain = cli.verbose || cli.debug;
    let mut stdout = io::stdout().lock();
    match command {
        Commands::Hierarchies(args) => hierarchies::run(&mut stdout, args, &config, full_chain)?,
        Commands::Events(args) => events::run(&mut stdout, args, &config, full_chain)?,
        Commands::History(args) => history::run(&mut stdout, args, &config)?,
    }

    Ok(())
}
