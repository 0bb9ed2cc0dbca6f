// src/cli/mod.rs — CLI definition (clap derive)

pub mod migrate;
pub mod profile;
pub mod reconcile;
pub mod serve;

use clap::{Parser, Subcommand};

use crate::infra::config::Config;
use crate::storage::{self, StoreHandle};

#[derive(Parser)]
#[command(name = "pairup", about = "Pair-programming session service", version)]
pub struct Cli {
    /// Config file path
    #[arg(long)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API (default when no subcommand given)
    Serve {
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Show or run database migrations
    Migrate {
        /// Only show applied migrations
        #[arg(long)]
        status: bool,
        /// Revert the most recent migration
        #[arg(long)]
        rollback: bool,
    },
    /// Run one realtime drift repair pass and exit
    Reconcile,
    /// Manage user profiles
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
}

#[derive(Subcommand, Clone)]
pub enum ProfileAction {
    /// Create or update a profile
    Add {
        /// Identity provider user id
        #[arg(long)]
        provider_id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        image_url: Option<String>,
    },
    /// List profiles
    List {
        #[arg(short, long, default_value = "50")]
        limit: u32,
    },
}

/// Open the configured database and hand it to a store server task.
pub fn open_store(config: &Config) -> anyhow::Result<(StoreHandle, tokio::task::JoinHandle<()>)> {
    let path = config.database.resolved_path();
    let store = storage::open(&path)?;
    tracing::debug!("Database opened at {}", path.display());
    Ok(storage::spawn_store_server(store))
}
