// src/session/orchestrator.rs — Session lifecycle: create, join, end, list
//
// The durable record is the source of truth. Realtime resources follow it:
// the store mutation always commits first, and a realtime failure after
// that is reported as a partial-failure kind and recorded as drift for the
// reconciler. Store mutations are never undone.

use std::sync::Arc;

use crate::infra::errors::{Result, SessionError};
use crate::realtime::{RealtimeError, RealtimeGateway, RealtimeResource};
use crate::session::call_id::generate_call_id;
use crate::session::types::{
    channel_name, CallMetadata, Caller, Difficulty, NewSession, ResourceDrift, Session,
    SessionView,
};
use crate::storage::{SessionFilter, SessionQuery, SessionStore};

/// Upper bound on list results.
pub const MAX_PAGE_SIZE: u32 = 20;
pub const MAX_PROBLEM_LEN: usize = 200;
pub const END_CONFIRMATION: &str = "Session ended successfully";

/// Caller-supplied fields for a new session.
#[derive(Debug, Clone)]
pub struct CreateSession {
    pub problem: String,
    pub difficulty: String,
}

/// Result of a successful end.
#[derive(Debug, Clone)]
pub struct EndOutcome {
    pub session: Session,
    pub message: String,
}

/// Clamp a requested page size to `1..=MAX_PAGE_SIZE`, defaulting to the max.
pub fn clamp_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(MAX_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

fn validate(input: &CreateSession) -> Result<(String, Difficulty)> {
    let problem = input.problem.trim();
    if problem.is_empty() {
        return Err(SessionError::Validation("problem is required".into()));
    }
    if problem.chars().count() > MAX_PROBLEM_LEN {
        return Err(SessionError::Validation(format!(
            "problem must be at most {MAX_PROBLEM_LEN} characters"
        )));
    }
    if input.difficulty.trim().is_empty() {
        return Err(SessionError::Validation("difficulty is required".into()));
    }
    let difficulty = input
        .difficulty
        .parse::<Difficulty>()
        .map_err(SessionError::Validation)?;
    Ok((problem.to_string(), difficulty))
}

/// Why a join was refused, given the session as it is now.
fn join_refusal(session: &Session, caller: &Caller) -> SessionError {
    if !session.is_active() {
        SessionError::AlreadyEnded {
            id: session.id.clone(),
        }
    } else if session.has_participant() {
        SessionError::SessionFull {
            id: session.id.clone(),
        }
    } else {
        SessionError::Validation("host cannot join their own session".into())
    }
}

fn log_failure(op: &'static str, session_id: Option<&str>, err: SessionError) -> SessionError {
    let session_id = err.session_id().or(session_id).unwrap_or("-").to_string();
    match err.kind() {
        "partial_provisioning" | "partial_teardown" => {
            tracing::warn!(op, %session_id, kind = err.kind(), "{err}")
        }
        "upstream" | "internal" => tracing::error!(op, %session_id, kind = err.kind(), "{err}"),
        _ => tracing::debug!(op, %session_id, kind = err.kind(), "{err}"),
    }
    err
}

/// Coordinates the session record with its realtime call and chat channel.
///
/// Holds no mutable state of its own; every operation can run concurrently.
pub struct SessionOrchestrator {
    store: Arc<dyn SessionStore>,
    gateway: Arc<dyn RealtimeGateway>,
}

impl SessionOrchestrator {
    pub fn new(store: Arc<dyn SessionStore>, gateway: Arc<dyn RealtimeGateway>) -> Self {
        Self { store, gateway }
    }

    /// Persist a new active session hosted by `caller`, then provision its
    /// realtime call and channel.
    pub async fn create(&self, caller: &Caller, input: CreateSession) -> Result<Session> {
        self.create_inner(caller, input)
            .await
            .map_err(|e| log_failure("create", None, e))
    }

    async fn create_inner(&self, caller: &Caller, input: CreateSession) -> Result<Session> {
        let (problem, difficulty) = validate(&input)?;
        let call_id = generate_call_id()?;

        let mut session = self
            .store
            .create(NewSession {
                problem,
                difficulty,
                call_id,
                host_id: caller.profile_id.clone(),
            })
            .await?;

        tracing::info!(
            op = "create",
            session_id = %session.id,
            call_id = %session.call_id,
            host = %caller.profile_id,
            host_name = %caller.name,
            "Session created"
        );

        let mut failed = Vec::new();

        let metadata = CallMetadata::for_session(&session);
        if let Err(e) = self
            .gateway
            .create_or_get_call(&session.call_id, &caller.provider_id, &metadata)
            .await
        {
            tracing::warn!(op = "create", session_id = %session.id, "Call provisioning failed: {e}");
            failed.push(RealtimeResource::Call);
        }

        let members = vec![caller.provider_id.clone()];
        if let Err(e) = self
            .gateway
            .create_channel(
                &session.call_id,
                &channel_name(&session.problem),
                &caller.provider_id,
                &members,
            )
            .await
        {
            tracing::warn!(op = "create", session_id = %session.id, "Channel provisioning failed: {e}");
            failed.push(RealtimeResource::Channel);
        }

        // The host may have ended the session while we were provisioning;
        // whatever we just created then outlives its teardown.
        let current = self.load(&session.id).await?;
        if !current.is_active() {
            session = current;
            tracing::warn!(
                op = "create",
                session_id = %session.id,
                "Session ended during provisioning, scheduling teardown"
            );
            self.record_drift(&mut session, ResourceDrift::Teardown, "create")
                .await;
            return Ok(session);
        }

        if failed.is_empty() {
            return Ok(session);
        }

        self.record_drift(&mut session, ResourceDrift::Provisioning, "create")
            .await;
        Err(SessionError::PartialProvisioning {
            session: Box::new(session),
            failed,
        })
    }

    /// Claim the participant slot of an active session for `caller`.
    pub async fn join(&self, caller: &Caller, session_id: &str) -> Result<Session> {
        self.join_inner(caller, session_id)
            .await
            .map_err(|e| log_failure("join", Some(session_id), e))
    }

    async fn join_inner(&self, caller: &Caller, session_id: &str) -> Result<Session> {
        let session = self.load(session_id).await?;
        if !session.is_active() || session.has_participant() || session.is_host(&caller.profile_id)
        {
            return Err(join_refusal(&session, caller));
        }

        let claimed = self
            .store
            .atomic_set_participant(session_id, &caller.profile_id)
            .await?;
        if !claimed {
            // Lost a race against another join or an end.
            let current = self.load(session_id).await?;
            return Err(join_refusal(&current, caller));
        }

        let mut session = self.load(session_id).await?;
        tracing::info!(
            op = "join",
            session_id = %session.id,
            participant = %caller.profile_id,
            participant_name = %caller.name,
            "Participant joined"
        );

        if let Err(e) = self
            .gateway
            .add_channel_member(&session.call_id, &caller.provider_id)
            .await
        {
            // The participant is set; channel membership catches up later.
            tracing::warn!(
                op = "join",
                session_id = %session.id,
                "Adding participant to channel failed, scheduling repair: {e}"
            );
            self.mark_membership_drift(&mut session, &caller.profile_id)
                .await;
        }

        Ok(session)
    }

    /// Complete a session and tear down its realtime resources. Host only.
    pub async fn end(&self, caller: &Caller, session_id: &str) -> Result<EndOutcome> {
        self.end_inner(caller, session_id)
            .await
            .map_err(|e| log_failure("end", Some(session_id), e))
    }

    async fn end_inner(&self, caller: &Caller, session_id: &str) -> Result<EndOutcome> {
        let session = self.load(session_id).await?;

        // Authorization gate: nothing below runs for a non-host.
        if !session.is_host(&caller.profile_id) {
            return Err(SessionError::Forbidden {
                id: session.id.clone(),
            });
        }
        if !session.is_active() {
            return Err(SessionError::AlreadyEnded {
                id: session.id.clone(),
            });
        }

        if !self.store.set_status_completed(session_id).await? {
            return Err(SessionError::AlreadyEnded {
                id: session.id.clone(),
            });
        }

        let mut session = self.load(session_id).await?;
        tracing::info!(op = "end", session_id = %session.id, "Session completed");

        let mut failed = Vec::new();

        let call_result = self.gateway.delete_call(&session.call_id, true).await;
        if let Err(e) = tolerate_missing(call_result) {
            tracing::error!(op = "end", session_id = %session.id, "Call deletion failed: {e}");
            failed.push(RealtimeResource::Call);
        }

        let channel_result = self.gateway.delete_channel(&session.call_id).await;
        if let Err(e) = tolerate_missing(channel_result) {
            tracing::error!(op = "end", session_id = %session.id, "Channel deletion failed: {e}");
            failed.push(RealtimeResource::Channel);
        }

        if !failed.is_empty() {
            self.record_drift(&mut session, ResourceDrift::Teardown, "end")
                .await;
            return Err(SessionError::PartialTeardown {
                session: Box::new(session),
                failed,
            });
        }

        if session.drift.is_some() {
            // Earlier drift is moot once both resources are gone.
            self.clear_drift(&mut session, "end").await;
        }

        Ok(EndOutcome {
            session,
            message: END_CONFIRMATION.to_string(),
        })
    }

    /// A single session with host and participant summaries.
    pub async fn get(&self, session_id: &str) -> Result<SessionView> {
        let view = self
            .store
            .find_view(session_id)
            .await
            .map_err(|e| log_failure("get", Some(session_id), e.into()))?;
        view.ok_or_else(|| SessionError::NotFound {
            id: session_id.to_string(),
        })
    }

    /// Active sessions, newest first.
    pub async fn list_active(&self, limit: Option<u32>) -> Result<Vec<SessionView>> {
        let query = SessionQuery {
            filter: SessionFilter::Active,
            limit: clamp_limit(limit),
        };
        self.store
            .find(query)
            .await
            .map_err(|e| log_failure("list_active", None, e.into()))
    }

    /// Completed sessions the caller hosted or joined, newest first.
    pub async fn list_recent(&self, caller: &Caller, limit: Option<u32>) -> Result<Vec<SessionView>> {
        let query = SessionQuery {
            filter: SessionFilter::CompletedWith {
                profile_id: caller.profile_id.clone(),
            },
            limit: clamp_limit(limit),
        };
        self.store
            .find(query)
            .await
            .map_err(|e| log_failure("list_recent", None, e.into()))
    }

    async fn load(&self, session_id: &str) -> Result<Session> {
        self.store
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| SessionError::NotFound {
                id: session_id.to_string(),
            })
    }

    /// Best effort: if the drift marker cannot be written the error is still
    /// reported to the caller, only the automatic repair is lost.
    async fn record_drift(&self, session: &mut Session, drift: ResourceDrift, op: &'static str) {
        match self.store.set_drift(&session.id, Some(drift)).await {
            Ok(()) => session.drift = Some(drift),
            Err(e) => tracing::error!(
                op,
                session_id = %session.id,
                drift = drift.as_str(),
                "Failed to record realtime drift: {e}"
            ),
        }
    }

    /// Mark membership drift unless another marker is already pending. Any
    /// pending marker already covers the participant.
    async fn mark_membership_drift(&self, session: &mut Session, participant_id: &str) {
        let marked = self
            .store
            .replace_drift_if(
                &session.id,
                None,
                Some(ResourceDrift::Membership),
                Some(participant_id),
            )
            .await;
        match marked {
            Ok(true) => session.drift = Some(ResourceDrift::Membership),
            Ok(false) => {
                tracing::debug!(op = "join", session_id = %session.id, "Realtime drift already pending")
            }
            Err(e) => tracing::error!(
                op = "join",
                session_id = %session.id,
                drift = ResourceDrift::Membership.as_str(),
                "Failed to record realtime drift: {e}"
            ),
        }
    }

    /// Clear the marker this operation saw, leaving any newer one in place.
    async fn clear_drift(&self, session: &mut Session, op: &'static str) {
        let cleared = self
            .store
            .replace_drift_if(
                &session.id,
                session.drift,
                None,
                session.participant_id.as_deref(),
            )
            .await;
        match cleared {
            Ok(true) => session.drift = None,
            Ok(false) => {}
            Err(e) => tracing::error!(op, session_id = %session.id, "Failed to clear realtime drift: {e}"),
        }
    }
}

/// A resource that is already gone counts as deleted.
pub(crate) fn tolerate_missing(
    result: std::result::Result<(), RealtimeError>,
) -> std::result::Result<(), RealtimeError> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}
