//! Lockstep CLI - stage, validate and lock releases.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::lock::LockAction;

#[derive(Parser)]
#[command(name = "lockstep")]
#[command(about = "Stage, validate and lock lockstep releases")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to lockstep.toml)
    #[arg(short, long, global = true, env = "LOCKSTEP_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload an artifact and its release document to the blob store
    Stage {
        /// Release document (JSON)
        #[arg(short, long)]
        release: PathBuf,

        /// Function artifact (zip)
        #[arg(short, long)]
        artifact: PathBuf,
    },

    /// Print the SHA-256 of an artifact, or the canonical hash of a release
    Hash {
        file: PathBuf,

        /// Treat the file as a release document
        #[arg(long)]
        release: bool,
    },

    /// Check a release document without contacting any service
    Validate { file: PathBuf },

    /// Manage a deployment lock
    Lock {
        #[command(subcommand)]
        action: LockAction,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lockstep=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Stage { release, artifact } => {
            commands::stage::run(&config, &release, &artifact).await?;
        }
        Commands::Hash { file, release } => commands::hash::run(&file, release).await?,
        Commands::Validate { file } => commands::validate::run(&config, &file).await?,
        Commands::Lock { action } => commands::lock::run(&config, action).await?,
    }

    Ok(())
}
