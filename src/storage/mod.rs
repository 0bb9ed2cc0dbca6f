// src/storage/mod.rs — Durable session and profile storage

pub mod schema;
pub mod store;
pub mod store_server;

use async_trait::async_trait;
use rusqlite::Connection;
use std::path::Path;

use crate::session::types::{NewProfile, NewSession, Profile, ResourceDrift, Session, SessionView};
pub use store_server::{spawn_store_server, StoreHandle};

/// Which sessions a list query selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionFilter {
    /// All active sessions.
    Active,
    /// Completed sessions the profile hosted or joined.
    CompletedWith { profile_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionQuery {
    pub filter: SessionFilter,
    pub limit: u32,
}

/// Session persistence. Holds no business rules beyond the conditional
/// updates, which must be atomic with respect to concurrent callers.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, fields: NewSession) -> anyhow::Result<Session>;

    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<Session>>;

    async fn find_view(&self, id: &str) -> anyhow::Result<Option<SessionView>>;

    /// Newest first by creation time, then id descending.
    async fn find(&self, query: SessionQuery) -> anyhow::Result<Vec<SessionView>>;

    /// Set the participant only if currently unset. Returns whether it was set.
    async fn atomic_set_participant(&self, id: &str, participant_id: &str)
        -> anyhow::Result<bool>;

    /// Move an active session to completed. Returns whether it moved.
    async fn set_status_completed(&self, id: &str) -> anyhow::Result<bool>;

    async fn set_drift(&self, id: &str, drift: Option<ResourceDrift>) -> anyhow::Result<()>;

    /// Compare-and-set on the drift marker, guarded by the participant the
    /// caller last saw. Returns whether it was replaced.
    async fn replace_drift_if(
        &self,
        id: &str,
        expected: Option<ResourceDrift>,
        next: Option<ResourceDrift>,
        participant_id: Option<&str>,
    ) -> anyhow::Result<bool>;

    async fn find_drifted(&self, limit: u32) -> anyhow::Result<Vec<Session>>;
}

/// Profile lookups used by the access guard and the CLI.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_profile_by_provider_id(&self, provider_id: &str)
        -> anyhow::Result<Option<Profile>>;

    async fn upsert_profile(&self, profile: NewProfile) -> anyhow::Result<Profile>;

    async fn list_profiles(&self, limit: u32) -> anyhow::Result<Vec<Profile>>;
}

/// Open (or create) the database at the given path and run migrations.
pub fn open(path: &Path) -> anyhow::Result<store::Store> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    schema::run_migrations(&conn)?;
    Ok(store::Store::new(conn))
}

/// Create an in-memory database (for testing).
pub fn open_in_memory() -> anyhow::Result<store::Store> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    schema::run_migrations(&conn)?;
    Ok(store::Store::new(conn))
}
