//! Ambiente CLI - headless engine simulator
//!
//! Command-line interface for running the Ambiente engines against a
//! simulated clock.

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ambiente::cli::commands::{self, SimulateOptions};
use ambiente::cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging (RUST_LOG wins over --verbose)
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    info!("Ambiente v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(cmd),
        None => {
            println!("Ambiente v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands) -> anyhow::Result<()> {
    match cmd {
        Commands::Domains { config } => commands::list_domains(config.as_deref()),
        Commands::Simulate {
            domain,
            seconds,
            config,
            toggle,
            speak_at,
            speak_for,
            eq,
        } => {
            let eq = match eq.as_deref() {
                Some([bass, mid, treble]) => Some((*bass, *mid, *treble)),
                Some(values) => anyhow::bail!("--eq takes three values, got {}", values.len()),
                None => None,
            };
            let options = SimulateOptions {
                domain,
                seconds,
                toggles: toggle,
                speak_at,
                speak_for,
                eq,
            };
            commands::simulate(config.as_deref(), &options)
        }
    }
}
