// tests/reconcile_test.rs — Integration tests for realtime drift repair

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pretty_assertions::assert_eq;

use pairup::realtime::local::{LocalGateway, LocalOp};
use pairup::realtime::{RealtimeError, RealtimeGateway};
use pairup::session::types::{CallMetadata, NewProfile, ResourceDrift};
use pairup::session::{Caller, CreateSession, ReconcileReport, Reconciler, SessionOrchestrator};
use pairup::storage::{open_in_memory, spawn_store_server, ProfileStore, SessionStore, StoreHandle};

struct Harness {
    store: Arc<StoreHandle>,
    gateway: Arc<LocalGateway>,
    orchestrator: SessionOrchestrator,
    reconciler: Reconciler,
}

impl Harness {
    fn new() -> Self {
        let (store, _join) = spawn_store_server(open_in_memory().unwrap());
        let store = Arc::new(store);
        let gateway = Arc::new(LocalGateway::new());
        Self {
            orchestrator: SessionOrchestrator::new(store.clone(), gateway.clone()),
            reconciler: Reconciler::new(store.clone(), gateway.clone(), 10),
            store,
            gateway,
        }
    }

    async fn caller(&self, provider_id: &str) -> Caller {
        let profile = self
            .store
            .upsert_profile(NewProfile {
                provider_id: provider_id.into(),
                name: provider_id.into(),
                email: format!("{provider_id}@example.com"),
                image_url: None,
            })
            .await
            .unwrap();
        Caller::from_profile(&profile)
    }

    async fn drift_of(&self, session_id: &str) -> Option<ResourceDrift> {
        self.store
            .find_by_id(session_id)
            .await
            .unwrap()
            .unwrap()
            .drift
    }
}

fn graph_problem() -> CreateSession {
    CreateSession {
        problem: "Course Schedule".into(),
        difficulty: "medium".into(),
    }
}

#[tokio::test]
async fn test_nothing_to_do() {
    let h = Harness::new();
    let report = h.reconciler.run_once().await.unwrap();
    assert_eq!(report, ReconcileReport::default());
}

#[tokio::test]
async fn test_repairs_failed_provisioning() {
    let h = Harness::new();
    let host = h.caller("host").await;
    h.gateway.fail_next(LocalOp::CreateCall, 1);
    h.gateway.fail_next(LocalOp::CreateChannel, 1);

    let err = h.orchestrator.create(&host, graph_problem()).await.unwrap_err();
    let session_id = err.session_id().unwrap().to_string();
    let session = h.store.find_by_id(&session_id).await.unwrap().unwrap();

    let report = h.reconciler.run_once().await.unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.repaired, 1);

    let call = h.gateway.call(&session.call_id).unwrap();
    assert_eq!(call.metadata.session_id, session_id);
    let channel = h.gateway.channel(&session.call_id).unwrap();
    assert_eq!(channel.name, "Course Schedule Session");
    assert_eq!(channel.members, vec!["host".to_string()]);
    assert!(h.drift_of(&session_id).await.is_none());
}

#[tokio::test]
async fn test_provisioning_repair_includes_participant() {
    let h = Harness::new();
    let host = h.caller("host").await;
    let p = h.caller("p").await;
    h.gateway.fail_next(LocalOp::CreateChannel, 1);

    let err = h.orchestrator.create(&host, graph_problem()).await.unwrap_err();
    let session_id = err.session_id().unwrap().to_string();

    // The channel is missing, so the member add fails too; drift stays set.
    let joined = h.orchestrator.join(&p, &session_id).await.unwrap();
    assert!(joined.drift.is_some());

    h.reconciler.run_once().await.unwrap();

    let channel = h.gateway.channel(&joined.call_id).unwrap();
    assert!(channel.members.contains(&"host".to_string()));
    assert!(channel.members.contains(&"p".to_string()));
    assert!(h.drift_of(&session_id).await.is_none());
}

#[tokio::test]
async fn test_repairs_membership() {
    let h = Harness::new();
    let host = h.caller("host").await;
    let p = h.caller("p").await;
    let session = h.orchestrator.create(&host, graph_problem()).await.unwrap();
    h.gateway.fail_next(LocalOp::AddMember, 1);
    h.orchestrator.join(&p, &session.id).await.unwrap();
    assert_eq!(h.drift_of(&session.id).await, Some(ResourceDrift::Membership));

    let report = h.reconciler.run_once().await.unwrap();
    assert_eq!(report.repaired, 1);
    assert!(h
        .gateway
        .channel(&session.call_id)
        .unwrap()
        .members
        .contains(&"p".to_string()));
    assert!(h.drift_of(&session.id).await.is_none());
}

#[tokio::test]
async fn test_repairs_teardown() {
    let h = Harness::new();
    let host = h.caller("host").await;
    let session = h.orchestrator.create(&host, graph_problem()).await.unwrap();
    h.gateway.fail_next(LocalOp::DeleteChannel, 1);
    assert!(h.orchestrator.end(&host, &session.id).await.is_err());

    h.reconciler.run_once().await.unwrap();

    assert!(h.gateway.call(&session.call_id).is_none());
    assert!(h.gateway.channel(&session.call_id).is_none());
    assert!(h.drift_of(&session.id).await.is_none());
}

#[tokio::test]
async fn test_ended_session_is_torn_down_not_provisioned() {
    let h = Harness::new();
    let host = h.caller("host").await;
    h.gateway.fail_next(LocalOp::CreateChannel, 1);
    let err = h.orchestrator.create(&host, graph_problem()).await.unwrap_err();
    let session_id = err.session_id().unwrap().to_string();
    let session = h.store.find_by_id(&session_id).await.unwrap().unwrap();

    // Mark it completed directly so the provisioning drift is still on record.
    assert!(h.store.set_status_completed(&session_id).await.unwrap());

    h.reconciler.run_once().await.unwrap();

    assert!(h.gateway.call(&session.call_id).is_none());
    assert!(h.gateway.channel(&session.call_id).is_none());
    assert_eq!(h.gateway.invocations(LocalOp::CreateChannel), 1);
    assert!(h.drift_of(&session_id).await.is_none());
}

#[tokio::test]
async fn test_failed_repair_keeps_drift_for_next_pass() {
    let h = Harness::new();
    let host = h.caller("host").await;
    h.gateway.fail_next(LocalOp::CreateChannel, 1);
    let err = h.orchestrator.create(&host, graph_problem()).await.unwrap_err();
    let session_id = err.session_id().unwrap().to_string();

    h.gateway.fail_always(LocalOp::CreateChannel);
    let report = h.reconciler.run_once().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(h.drift_of(&session_id).await, Some(ResourceDrift::Provisioning));

    h.gateway.clear_failures();
    let report = h.reconciler.run_once().await.unwrap();
    assert_eq!(report.repaired, 1);
    assert!(h.drift_of(&session_id).await.is_none());
}

/// Lets a participant join right before the channel is (re)created, so the
/// join's member add fails against the still-missing channel.
struct JoinBeforeChannel {
    inner: Arc<LocalGateway>,
    joiner: SessionOrchestrator,
    pending: Mutex<Option<(Caller, String)>>,
}

#[async_trait]
impl RealtimeGateway for JoinBeforeChannel {
    fn id(&self) -> &str {
        "join-before-channel"
    }

    async fn create_or_get_call(
        &self,
        call_id: &str,
        owner_provider_id: &str,
        metadata: &CallMetadata,
    ) -> Result<(), RealtimeError> {
        self.inner
            .create_or_get_call(call_id, owner_provider_id, metadata)
            .await
    }

    async fn delete_call(&self, call_id: &str, hard: bool) -> Result<(), RealtimeError> {
        self.inner.delete_call(call_id, hard).await
    }

    async fn create_channel(
        &self,
        call_id: &str,
        name: &str,
        owner_provider_id: &str,
        initial_members: &[String],
    ) -> Result<(), RealtimeError> {
        let pending = self.pending.lock().unwrap().take();
        if let Some((caller, session_id)) = pending {
            self.joiner.join(&caller, &session_id).await.unwrap();
        }
        self.inner
            .create_channel(call_id, name, owner_provider_id, initial_members)
            .await
    }

    async fn add_channel_member(
        &self,
        call_id: &str,
        provider_id: &str,
    ) -> Result<(), RealtimeError> {
        self.inner.add_channel_member(call_id, provider_id).await
    }

    async fn delete_channel(&self, call_id: &str) -> Result<(), RealtimeError> {
        self.inner.delete_channel(call_id).await
    }
}

#[tokio::test]
async fn test_join_during_repair_keeps_drift() {
    let h = Harness::new();
    let host = h.caller("host").await;
    let p = h.caller("p").await;
    h.gateway.fail_next(LocalOp::CreateChannel, 1);
    let err = h.orchestrator.create(&host, graph_problem()).await.unwrap_err();
    let session_id = err.session_id().unwrap().to_string();
    let session = h.store.find_by_id(&session_id).await.unwrap().unwrap();

    let gateway = Arc::new(JoinBeforeChannel {
        inner: h.gateway.clone(),
        joiner: SessionOrchestrator::new(h.store.clone(), h.gateway.clone()),
        pending: Mutex::new(Some((p.clone(), session_id.clone()))),
    });
    let reconciler = Reconciler::new(h.store.clone(), gateway, 10);

    // The pass provisions for the host only; the participant it never saw
    // must not lose its repair.
    let report = reconciler.run_once().await.unwrap();
    assert_eq!(report.deferred, 1);
    assert_eq!(report.repaired, 0);
    let channel = h.gateway.channel(&session.call_id).unwrap();
    assert_eq!(channel.members, vec!["host".to_string()]);
    assert_eq!(h.drift_of(&session_id).await, Some(ResourceDrift::Provisioning));

    let report = reconciler.run_once().await.unwrap();
    assert_eq!(report.repaired, 1);
    let channel = h.gateway.channel(&session.call_id).unwrap();
    assert!(channel.members.contains(&"p".to_string()));
    assert!(h.drift_of(&session_id).await.is_none());
}

#[tokio::test]
async fn test_membership_drift_does_not_replace_provisioning() {
    let h = Harness::new();
    let host = h.caller("host").await;
    let p = h.caller("p").await;
    h.gateway.fail_next(LocalOp::CreateChannel, 1);
    let err = h.orchestrator.create(&host, graph_problem()).await.unwrap_err();
    let session_id = err.session_id().unwrap().to_string();

    h.orchestrator.join(&p, &session_id).await.unwrap();
    assert_eq!(h.drift_of(&session_id).await, Some(ResourceDrift::Provisioning));
}
