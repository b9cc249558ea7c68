mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, minipool::MinipoolSubcommand};
use smartnode_core::paths;
use std::io::IsTerminal;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "smartnode",
    about = "Smart node daemon: watches the node's minipools and advances their lifecycle",
    version,
    propagate_version = true
)]
struct Cli {
    /// Node directory holding config.yml and settings.yml (default: ~/.rocketpool)
    #[arg(long, global = true, env = "SMARTNODE_DIR")]
    dir: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Log at debug level
    #[arg(long, global = true, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the background tasks until interrupted
    Daemon,

    /// Inspect the node's minipools
    Minipool {
        #[command(subcommand)]
        subcommand: MinipoolSubcommand,
    },

    /// Show or validate the merged configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        match &cli.command {
            Commands::Daemon => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    let result = paths::resolve_node_dir(cli.dir.as_deref())
        .map_err(anyhow::Error::from)
        .and_then(|dir| match cli.command {
            Commands::Daemon => cmd::daemon::run(&dir),
            Commands::Minipool { subcommand } => cmd::minipool::run(&dir, subcommand, cli.json),
            Commands::Config { subcommand } => cmd::config::run(&dir, subcommand, cli.json),
        });

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
