use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pt_cli::commands::util::read_input;
use pt_cli::commands::{flatten, track};
use pt_cli::{Cli, Commands, Config};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support; stdout is reserved for JSON
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let mut config =
        Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    config.pretty |= cli.pretty;
    tracing::debug!(?config, "loaded configuration");

    let stdout = io::stdout();
    let mut writer = stdout.lock();

    match &cli.command {
        Some(Commands::Track(args)) => {
            let input = read_input(args.input.as_deref())?;
            track::run(&mut writer, &input, &config)?;
        }
        Some(Commands::Flatten(args)) => {
            let input = read_input(args.input.as_deref())?;
            flatten::run(&mut writer, &input, &config)?;
        }
        None => {
            // Plain stdin -> stdout filter
            let input = read_input(None)?;
            track::run(&mut writer, &input, &config)?;
        }
    }

    writer.flush().context("failed to flush output")?;
    Ok(())
}
