//! Orrery CLI - offline rendering and patch tools for the orrery synthesizer.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "orrery")]
#[command(author, version, about = "Orrery orbital synthesizer CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a script to a stereo WAV file
    Render(commands::render::RenderArgs),

    /// List parameters with their defaults and ranges
    Params(commands::params::ParamsArgs),

    /// Write the default patch to a TOML or JSON file
    Patch(commands::patch::PatchArgs),
}

/// Install the stderr subscriber and route `log` records through it.
///
/// `RUST_LOG` overrides the default `info` filter. Fails if a global
/// subscriber or logger is already set.
fn init_logging() -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_logging()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Render(args) => commands::render::run(args),
        Commands::Params(args) => commands::params::run(args),
        Commands::Patch(args) => commands::patch::run(args),
    }
}
