// src/api/types.rs

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::infra::errors::SessionError;
use crate::session::types::{Session, SessionView};

/// Request body for creating a session. Missing fields are reported as
/// validation errors rather than deserialization failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub problem: String,
    #[serde(default)]
    pub difficulty: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session: Session,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionViewResponse {
    pub session: SessionView,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EndSessionResponse {
    pub session: Session,
    pub message: String,
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub kind: String,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

pub fn status_for(err: &SessionError) -> StatusCode {
    match err {
        SessionError::Validation(_) => StatusCode::BAD_REQUEST,
        SessionError::Auth(_) => StatusCode::UNAUTHORIZED,
        SessionError::Forbidden { .. } => StatusCode::FORBIDDEN,
        SessionError::NotFound { .. } => StatusCode::NOT_FOUND,
        SessionError::SessionFull { .. } => StatusCode::CONFLICT,
        SessionError::AlreadyEnded { .. } => StatusCode::BAD_REQUEST,
        SessionError::PartialProvisioning { .. }
        | SessionError::PartialTeardown { .. }
        | SessionError::Upstream(_) => StatusCode::BAD_GATEWAY,
        SessionError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        let session_id = if self.is_partial() {
            self.session_id().map(str::to_string)
        } else {
            None
        };
        let body = ErrorResponse {
            kind: self.kind().to_string(),
            error: self.public_message(),
            session_id,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_and_missing_use_distinct_statuses() {
        let full = SessionError::SessionFull { id: "s".into() };
        let missing = SessionError::NotFound { id: "s".into() };
        assert_eq!(status_for(&full), StatusCode::CONFLICT);
        assert_eq!(status_for(&missing), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_end_related_statuses() {
        assert_eq!(
            status_for(&SessionError::Forbidden { id: "s".into() }),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(&SessionError::AlreadyEnded { id: "s".into() }),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_create_request_tolerates_missing_fields() {
        let req: CreateSessionRequest = serde_json::from_str(r#"{"problem":"Two Sum"}"#).unwrap();
        assert_eq!(req.problem, "Two Sum");
        assert!(req.difficulty.is_empty());
    }
}
