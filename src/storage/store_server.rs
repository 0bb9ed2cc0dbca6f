// src/storage/store_server.rs — Async message passing for Store
//
// One task owns the SQLite connection and executes commands in arrival
// order, so each conditional update is atomic with respect to every other
// request.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use super::store::Store;
use super::{ProfileStore, SessionQuery, SessionStore};
use crate::session::types::{NewProfile, NewSession, Profile, ResourceDrift, Session, SessionView};

type Reply<T> = oneshot::Sender<anyhow::Result<T>>;

#[derive(Debug)]
pub enum StoreCommand {
    InsertSession {
        fields: NewSession,
        resp: Reply<Session>,
    },
    FindSession {
        id: String,
        resp: Reply<Option<Session>>,
    },
    FindSessionView {
        id: String,
        resp: Reply<Option<SessionView>>,
    },
    QuerySessions {
        query: SessionQuery,
        resp: Reply<Vec<SessionView>>,
    },
    SetParticipantIfUnset {
        id: String,
        participant_id: String,
        resp: Reply<bool>,
    },
    CompleteSession {
        id: String,
        resp: Reply<bool>,
    },
    SetDrift {
        id: String,
        drift: Option<ResourceDrift>,
        resp: Reply<()>,
    },
    ReplaceDriftIf {
        id: String,
        expected: Option<ResourceDrift>,
        next: Option<ResourceDrift>,
        participant_id: Option<String>,
        resp: Reply<bool>,
    },
    QueryDrifted {
        limit: u32,
        resp: Reply<Vec<Session>>,
    },
    UpsertProfile {
        profile: NewProfile,
        resp: Reply<Profile>,
    },
    FindProfileByProviderId {
        provider_id: String,
        resp: Reply<Option<Profile>>,
    },
    ListProfiles {
        limit: u32,
        resp: Reply<Vec<Profile>>,
    },
}

/// A handle to the Store that uses message passing.
#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<StoreCommand>,
}

impl StoreHandle {
    pub fn new(tx: mpsc::Sender<StoreCommand>) -> Self {
        Self { tx }
    }

    async fn request<T: Send>(
        &self,
        build: impl FnOnce(Reply<T>) -> StoreCommand + Send,
    ) -> anyhow::Result<T> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(build(resp_tx))
            .await
            .map_err(|_| anyhow::anyhow!("store server has shut down"))?;
        resp_rx.await?
    }
}

#[async_trait]
impl SessionStore for StoreHandle {
    async fn create(&self, fields: NewSession) -> anyhow::Result<Session> {
        self.request(|resp| StoreCommand::InsertSession { fields, resp })
            .await
    }

    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<Session>> {
        let id = id.to_string();
        self.request(|resp| StoreCommand::FindSession { id, resp })
            .await
    }

    async fn find_view(&self, id: &str) -> anyhow::Result<Option<SessionView>> {
        let id = id.to_string();
        self.request(|resp| StoreCommand::FindSessionView { id, resp })
            .await
    }

    async fn find(&self, query: SessionQuery) -> anyhow::Result<Vec<SessionView>> {
        self.request(|resp| StoreCommand::QuerySessions { query, resp })
            .await
    }

    async fn atomic_set_participant(
        &self,
        id: &str,
        participant_id: &str,
    ) -> anyhow::Result<bool> {
        let id = id.to_string();
        let participant_id = participant_id.to_string();
        self.request(|resp| StoreCommand::SetParticipantIfUnset {
            id,
            participant_id,
            resp,
        })
        .await
    }

    async fn set_status_completed(&self, id: &str) -> anyhow::Result<bool> {
        let id = id.to_string();
        self.request(|resp| StoreCommand::CompleteSession { id, resp })
            .await
    }

    async fn set_drift(&self, id: &str, drift: Option<ResourceDrift>) -> anyhow::Result<()> {
        let id = id.to_string();
        self.request(|resp| StoreCommand::SetDrift { id, drift, resp })
            .await
    }

    async fn replace_drift_if(
        &self,
        id: &str,
        expected: Option<ResourceDrift>,
        next: Option<ResourceDrift>,
        participant_id: Option<&str>,
    ) -> anyhow::Result<bool> {
        let id = id.to_string();
        let participant_id = participant_id.map(str::to_string);
        self.request(|resp| StoreCommand::ReplaceDriftIf {
            id,
            expected,
            next,
            participant_id,
            resp,
        })
        .await
    }

    async fn find_drifted(&self, limit: u32) -> anyhow::Result<Vec<Session>> {
        self.request(|resp| StoreCommand::QueryDrifted { limit, resp })
            .await
    }
}

#[async_trait]
impl ProfileStore for StoreHandle {
    async fn find_profile_by_provider_id(
        &self,
        provider_id: &str,
    ) -> anyhow::Result<Option<Profile>> {
        let provider_id = provider_id.to_string();
        self.request(|resp| StoreCommand::FindProfileByProviderId { provider_id, resp })
            .await
    }

    async fn upsert_profile(&self, profile: NewProfile) -> anyhow::Result<Profile> {
        self.request(|resp| StoreCommand::UpsertProfile { profile, resp })
            .await
    }

    async fn list_profiles(&self, limit: u32) -> anyhow::Result<Vec<Profile>> {
        self.request(|resp| StoreCommand::ListProfiles { limit, resp })
            .await
    }
}

/// Helper to spawn the store server and return a handle.
pub fn spawn_store_server(store: Store) -> (StoreHandle, tokio::task::JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(100);
    let handle = StoreHandle::new(tx);
    let join_handle = tokio::spawn(run_store_server(store, rx));
    (handle, join_handle)
}

/// The background task that owns the Store.
pub async fn run_store_server(store: Store, mut rx: mpsc::Receiver<StoreCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            StoreCommand::InsertSession { fields, resp } => {
                let _ = resp.send(store.insert_session(&fields));
            }
            StoreCommand::FindSession { id, resp } => {
                let _ = resp.send(store.find_session(&id));
            }
            StoreCommand::FindSessionView { id, resp } => {
                let _ = resp.send(store.find_session_view(&id));
            }
            StoreCommand::QuerySessions { query, resp } => {
                let _ = resp.send(store.query_sessions(&query));
            }
            StoreCommand::SetParticipantIfUnset {
                id,
                participant_id,
                resp,
            } => {
                let _ = resp.send(store.set_participant_if_unset(&id, &participant_id));
            }
            StoreCommand::CompleteSession { id, resp } => {
                let _ = resp.send(store.complete_session(&id));
            }
            StoreCommand::SetDrift { id, drift, resp } => {
                let _ = resp.send(store.set_drift(&id, drift));
            }
            StoreCommand::ReplaceDriftIf {
                id,
                expected,
                next,
                participant_id,
                resp,
            } => {
                let _ = resp.send(store.replace_drift_if(
                    &id,
                    expected,
                    next,
                    participant_id.as_deref(),
                ));
            }
            StoreCommand::QueryDrifted { limit, resp } => {
                let _ = resp.send(store.query_drifted(limit));
            }
            StoreCommand::UpsertProfile { profile, resp } => {
                let _ = resp.send(store.upsert_profile(&profile));
            }
            StoreCommand::FindProfileByProviderId { provider_id, resp } => {
                let _ = resp.send(store.find_profile_by_provider_id(&provider_id));
            }
            StoreCommand::ListProfiles { limit, resp } => {
                let _ = resp.send(store.list_profiles(limit));
            }
        }
    }
    tracing::debug!("Store server stopped: all handles dropped");
}
