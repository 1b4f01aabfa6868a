//! `locator`: finds a named user by walking the search listing, company pages
//! and project user lists of the target system.
//!
//! Every navigation is handled as a brand new context; progress lives only in
//! the state directory, so an interrupted search continues with `locator resume`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use engine_logging::LogDestination;

mod platform;

#[derive(Parser)]
#[command(name = "locator")]
#[command(version)]
#[command(about = "Locate a record through the search, branch and leaf pages of a site")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// RON settings file; `./locator.ron` is used when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the run state, result cache and last outcome.
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Origin of the target site, e.g. `https://crm.example.com`.
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Maximum candidate probes in flight.
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Also write logs to ./locator.log.
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start a new search, replacing any active one.
    Start {
        query: String,
        /// Visit every listed branch instead of asking for a choice.
        #[arg(long)]
        all: bool,
    },
    /// Continue with one of the branches offered by the last listing.
    Select { index: usize },
    /// Continue the active search from its last known location.
    Resume,
    /// Drop the active search. Cached matches are kept.
    Stop,
    /// Drop the active search and the last outcome. Cached matches are kept.
    Clear,
    /// Show the active search, the last outcome and the cache size.
    Status,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let destination = if cli.log_file {
        LogDestination::Both
    } else {
        LogDestination::Terminal
    };
    engine_logging::initialize(destination, engine_logging::level_for_verbosity(cli.verbose));

    let overrides = platform::config::Overrides {
        state_dir: cli.state_dir,
        base_url: cli.base_url,
        concurrency: cli.concurrency,
    };
    let config = platform::config::load(cli.config.as_deref(), overrides)?;
    platform::app::run(cli.command, config)
}
