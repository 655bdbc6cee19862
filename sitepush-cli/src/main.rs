//! sitepush: render a static site and push what changed to its remote.
//!
//! # Usage
//!
//! ```text
//! sitepush [--config <path>] [-v...] render <site>|--all [--force] [--dry-run]
//! sitepush [--config <path>] [-v...] plan <site>
//! sitepush [--config <path>] [-v...] push <site>|--all [--dry-run] [--force] [--delete]
//! sitepush [--config <path>] [-v...] status
//! ```

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use commands::{plan::PlanArgs, push::PushArgs, render::RenderArgs, status::StatusArgs};
use sitepush_core::CONFIG_FILE;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "sitepush",
    version,
    about = "Render static sites from templates and publish changes to their remotes",
    long_about = None,
)]
struct Cli {
    /// Path to the site configuration file.
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Raise log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render templates and assets into a site's output tree.
    Render(RenderArgs),

    /// Show what a push would transfer, without touching the remote.
    Plan(PlanArgs),

    /// Render, then upload changed files and the manifest to the remote.
    Push(PushArgs),

    /// Show render staleness and pending transfers for every site.
    Status(StatusArgs),
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    log::debug!("using config {}", cli.config.display());

    match cli.command {
        Commands::Render(args) => args.run(&cli.config).map(|()| ExitCode::SUCCESS),
        Commands::Plan(args) => args.run(&cli.config).map(|()| ExitCode::SUCCESS),
        Commands::Push(args) => args.run(&cli.config),
        Commands::Status(args) => args.run(&cli.config).map(|()| ExitCode::SUCCESS),
    }
}
