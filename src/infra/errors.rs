// src/infra/errors.rs — Error taxonomy for session lifecycle operations

use thiserror::Error;

use crate::realtime::{RealtimeError, RealtimeResource};
use crate::session::types::Session;

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Error, Debug)]
pub enum SessionError {
    // Rejected before any mutation
    #[error("{0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Auth(String),

    #[error("Only the host can end session '{id}'")]
    Forbidden { id: String },

    #[error("Session '{id}' not found")]
    NotFound { id: String },

    #[error("Session '{id}' is full")]
    SessionFull { id: String },

    #[error("Session '{id}' has already ended")]
    AlreadyEnded { id: String },

    // The store committed, a realtime step did not
    #[error(
        "Session '{}' was created but realtime provisioning failed for: {}",
        .session.id,
        resource_list(.failed)
    )]
    PartialProvisioning {
        session: Box<Session>,
        failed: Vec<RealtimeResource>,
    },

    #[error(
        "Session '{}' was ended but realtime teardown failed for: {}",
        .session.id,
        resource_list(.failed)
    )]
    PartialTeardown {
        session: Box<Session>,
        failed: Vec<RealtimeResource>,
    },

    // Provider failure with no local state changed
    #[error("Realtime provider error: {0}")]
    Upstream(#[from] RealtimeError),

    // Store or runtime failure
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl SessionError {
    /// Stable snake_case name of the taxonomy kind, safe to show to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::Validation(_) => "validation",
            SessionError::Auth(_) => "unauthorized",
            SessionError::Forbidden { .. } => "forbidden",
            SessionError::NotFound { .. } => "not_found",
            SessionError::SessionFull { .. } => "session_full",
            SessionError::AlreadyEnded { .. } => "already_ended",
            SessionError::PartialProvisioning { .. } => "partial_provisioning",
            SessionError::PartialTeardown { .. } => "partial_teardown",
            SessionError::Upstream(_) => "upstream",
            SessionError::Store(_) => "internal",
        }
    }

    /// True when a store mutation committed but realtime resources lag behind it.
    pub fn is_partial(&self) -> bool {
        matches!(
            self,
            SessionError::PartialProvisioning { .. } | SessionError::PartialTeardown { .. }
        )
    }

    /// Session the error refers to, when there is one.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            SessionError::Forbidden { id }
            | SessionError::NotFound { id }
            | SessionError::SessionFull { id }
            | SessionError::AlreadyEnded { id } => Some(id),
            SessionError::PartialProvisioning { session, .. }
            | SessionError::PartialTeardown { session, .. } => Some(&session.id),
            _ => None,
        }
    }

    /// Message for API responses. Never carries provider or database internals.
    pub fn public_message(&self) -> String {
        match self {
            SessionError::Validation(_)
            | SessionError::Auth(_)
            | SessionError::Forbidden { .. }
            | SessionError::NotFound { .. } => self.to_string(),
            SessionError::SessionFull { .. } => "Session is full".into(),
            SessionError::AlreadyEnded { .. } => "Session has already ended".into(),
            SessionError::PartialProvisioning { failed, .. } => format!(
                "Session was created but its {} could not be provisioned; it will be repaired automatically",
                resource_list(failed)
            ),
            SessionError::PartialTeardown { failed, .. } => format!(
                "Session was ended but its {} could not be removed; cleanup is pending",
                resource_list(failed)
            ),
            SessionError::Upstream(_) => "Realtime provider is unavailable".into(),
            _ => "Internal server error".into(),
        }
    }
}

fn resource_list(resources: &[RealtimeResource]) -> String {
    resources
        .iter()
        .map(|r| r.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_are_distinct_for_join_failures() {
        let missing = SessionError::NotFound { id: "s1".into() };
        let full = SessionError::SessionFull { id: "s1".into() };
        assert_ne!(missing.kind(), full.kind());
        assert_eq!(full.session_id(), Some("s1"));
    }

    #[test]
    fn test_upstream_message_hides_provider_detail() {
        let err = SessionError::Upstream(RealtimeError::Rejected {
            status: 500,
            message: "internal stack trace from provider".into(),
        });
        assert_eq!(err.kind(), "upstream");
        assert!(!err.public_message().contains("stack trace"));
        assert!(!err.is_partial());
    }

    #[test]
    fn test_store_errors_are_internal() {
        let err = SessionError::from(anyhow::anyhow!("disk I/O error"));
        assert_eq!(err.kind(), "internal");
        assert_eq!(err.public_message(), "Internal server error");
    }

    #[test]
    fn test_resource_list_joins_names() {
        let list = resource_list(&[RealtimeResource::Call, RealtimeResource::Channel]);
        assert_eq!(list, "call, channel");
    }
}
