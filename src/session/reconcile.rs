// src/session/reconcile.rs — Background repair of realtime drift
//
// Sessions whose realtime resources fell behind the durable record carry a
// drift marker. Each pass loads a batch of them and brings the call and
// channel back in line with the session status. Status and participant are
// never touched here.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::infra::errors::{Result, SessionError};
use crate::realtime::RealtimeGateway;
use crate::session::orchestrator::tolerate_missing;
use crate::session::types::{channel_name, CallMetadata, ResourceDrift, Session, SessionView};
use crate::storage::SessionStore;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub scanned: usize,
    pub repaired: usize,
    /// Repaired, but the session changed meanwhile; left for the next pass.
    pub deferred: usize,
    pub failed: usize,
}

/// How a single repair ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Repair {
    Settled,
    Deferred,
}

pub struct Reconciler {
    store: Arc<dyn SessionStore>,
    gateway: Arc<dyn RealtimeGateway>,
    batch_size: u32,
}

impl Reconciler {
    pub fn new(store: Arc<dyn SessionStore>, gateway: Arc<dyn RealtimeGateway>, batch_size: u32) -> Self {
        Self {
            store,
            gateway,
            batch_size: batch_size.max(1),
        }
    }

    /// Repair one batch of drifted sessions.
    pub async fn run_once(&self) -> Result<ReconcileReport> {
        let drifted = self.store.find_drifted(self.batch_size).await?;
        let mut report = ReconcileReport::default();

        for session in &drifted {
            report.scanned += 1;
            match self.repair(session).await {
                Ok(Repair::Settled) => {
                    report.repaired += 1;
                    tracing::info!(op = "reconcile", session_id = %session.id, "Realtime drift repaired");
                }
                Ok(Repair::Deferred) => {
                    report.deferred += 1;
                    tracing::info!(
                        op = "reconcile",
                        session_id = %session.id,
                        "Session changed during repair, keeping drift for next pass"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        op = "reconcile",
                        session_id = %session.id,
                        kind = e.kind(),
                        "Realtime drift repair failed, will retry: {e}"
                    );
                }
            }
        }

        if report.scanned > 0 {
            tracing::info!(
                scanned = report.scanned,
                repaired = report.repaired,
                deferred = report.deferred,
                failed = report.failed,
                "Reconcile pass finished"
            );
        }
        Ok(report)
    }

    /// Run passes every `interval` until the returned task is aborted.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.run_once().await {
                    tracing::error!("Reconcile pass failed: {e}");
                }
            }
        })
    }

    async fn repair(&self, session: &Session) -> Result<Repair> {
        // Re-read with profile summaries; the batch row may be stale.
        let view = self.load_view(&session.id).await?;
        let Some(drift) = view.session.drift else {
            return Ok(Repair::Settled);
        };

        if !view.session.is_active() || drift == ResourceDrift::Teardown {
            self.teardown(&view.session).await?;
            return self.settle(&view.session, drift).await;
        }

        let host = view
            .host
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("host profile '{}' missing", view.session.host_id))?;
        let call_id = &view.session.call_id;

        if drift == ResourceDrift::Provisioning {
            let metadata = CallMetadata::for_session(&view.session);
            self.gateway
                .create_or_get_call(call_id, &host.provider_id, &metadata)
                .await?;
            self.gateway
                .create_channel(
                    call_id,
                    &channel_name(&view.session.problem),
                    &host.provider_id,
                    &[host.provider_id.clone()],
                )
                .await?;
        }

        if let Some(ref participant) = view.participant {
            self.gateway
                .add_channel_member(call_id, &participant.provider_id)
                .await?;
        }

        // An end may have landed while we were provisioning.
        let current = self.load_view(&view.session.id).await?;
        if !current.session.is_active() {
            self.store
                .set_drift(&view.session.id, Some(ResourceDrift::Teardown))
                .await?;
            return Ok(Repair::Deferred);
        }
        self.settle(&view.session, drift).await
    }

    /// Clear the marker only if neither it nor the participant moved since
    /// `seen` was read. A join that lands mid-repair keeps the session drifted.
    async fn settle(&self, seen: &Session, drift: ResourceDrift) -> Result<Repair> {
        let cleared = self
            .store
            .replace_drift_if(&seen.id, Some(drift), None, seen.participant_id.as_deref())
            .await?;
        Ok(if cleared {
            Repair::Settled
        } else {
            Repair::Deferred
        })
    }

    async fn teardown(&self, session: &Session) -> Result<()> {
        tolerate_missing(self.gateway.delete_call(&session.call_id, true).await)?;
        tolerate_missing(self.gateway.delete_channel(&session.call_id).await)?;
        Ok(())
    }

    async fn load_view(&self, session_id: &str) -> Result<SessionView> {
        self.store
            .find_view(session_id)
            .await?
            .ok_or_else(|| SessionError::NotFound {
                id: session_id.to_string(),
            })
    }
}
