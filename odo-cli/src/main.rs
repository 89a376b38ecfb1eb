//! odo: push local source changes into a running component.
//!
//! # Usage
//!
//! ```text
//! odo push [--context DIR] [--ignore GLOB]... [-f|--force] [--show-log]
//! odo watch [--context DIR] [--ignore GLOB]... [--delay MS] [--show-log]
//! odo status [--context DIR] [--ignore GLOB]... [--json]
//! odo config view|set|unset [--context DIR]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{config::ConfigCommand, push::PushArgs, status::StatusArgs, watch::WatchArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "odo",
    version,
    about = "Push local source changes into a running component",
    long_about = None,
)]
struct Cli {
    /// Log debug details to stderr (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sync changed files into the component, then build and reload.
    Push(PushArgs),

    /// Push, then push again whenever the source tree changes.
    Watch(WatchArgs),

    /// Show files that the next push would sync, without contacting the cluster.
    Status(StatusArgs),

    /// View or modify the component's local configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Push(args) => args.run(),
        Commands::Watch(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Config { command } => commands::config::run(command),
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
