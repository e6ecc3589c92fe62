mod commands;
mod interactive;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "elif-migrate")]
#[command(about = "Discover, inspect and apply versioned database migrations")]
struct Cli {
    /// Migrator configuration file
    #[arg(long, short, default_value = "migrator.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List pending migrations
    List,

    /// Show every migration with its state and the current version
    Status,

    /// Show the version log
    History,

    /// Apply pending migrations
    Up {
        /// Apply everything without asking
        #[arg(long, short)]
        yes: bool,

        /// Ask before each migration and after each failure
        #[arg(long, short, conflicts_with = "yes")]
        interactive: bool,

        /// Keep going after a migration reports errors
        #[arg(long)]
        continue_on_error: bool,
    },

    /// Revert specific migrations
    Down {
        /// Versions to revert
        #[arg(required = true)]
        versions: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = commands::load_config(&cli.config)?;

    match cli.command {
        Commands::List => commands::list(&config).await?,
        Commands::Status => commands::status(&config).await?,
        Commands::History => commands::history(&config).await?,
        Commands::Up {
            yes,
            interactive,
            continue_on_error,
        } => commands::up(&config, yes, interactive, continue_on_error).await?,
        Commands::Down { versions } => commands::down(&config, &versions).await?,
    }

    Ok(())
}
