//! Topodelta CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use topodelta_core::ProjectId;
use topodelta_store::STORE_DIR;

mod commands;

#[derive(Parser)]
#[command(name = "topodelta")]
#[command(about = "Incremental change tracking and persistence for topology diagrams", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Store directory holding snapshots and deltas
    #[arg(short, long, default_value = STORE_DIR)]
    store: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay an edit journal against a project and persist the result
    Replay {
        /// Project id
        #[arg(short, long)]
        project: ProjectId,

        /// JSON Lines file of edit events
        #[arg(short, long)]
        journal: PathBuf,

        /// Tracking config (defaults to topodelta.toml if present)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Load a project from the store and summarize it
    Inspect {
        /// Project id
        #[arg(short, long)]
        project: ProjectId,
    },
    /// Delete a project's stored state
    Clear {
        /// Project id
        #[arg(short, long)]
        project: ProjectId,
    },
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "topodelta={level},topodelta_core={level},topodelta_store={level}",
            level = log_level
        )))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Store: {}", cli.store.display());

    match cli.command {
        Commands::Replay {
            project,
            journal,
            config,
        } => commands::replay(cli.store, project, journal, config).await,
        Commands::Inspect { project } => commands::inspect(cli.store, project).await,
        Commands::Clear { project } => commands::clear(cli.store, project).await,
        Commands::Version => {
            println!("Topodelta v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
