// src/main.rs — pairup entry point

use clap::Parser;

use pairup::cli::{self, Cli, Commands};
use pairup::infra::config::Config;
use pairup::infra::logger;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Falls back to defaults if no config.toml
    let config = if let Some(ref path) = cli.config {
        Config::load_from(std::path::Path::new(path))?
    } else {
        Config::load()?
    };

    logger::init_logging(&config.logging.level);

    match cli.command {
        None => cli::serve::run_serve(&config, None).await,
        Some(Commands::Serve { port }) => cli::serve::run_serve(&config, port).await,
        Some(Commands::Migrate { status, rollback }) => {
            cli::migrate::run_migrate(&config.database.resolved_path(), status, rollback)
        }
        Some(Commands::Reconcile) => cli::reconcile::run_reconcile(&config).await,
        Some(Commands::Profile { action }) => cli::profile::run_profile(&config, action).await,
    }
}
