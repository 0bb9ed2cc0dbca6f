// src/api/handlers.rs

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use crate::api::{auth, types::*, ApiState};
use crate::infra::errors::SessionError;
use crate::session::CreateSession;

/// POST /api/sessions — Create a session hosted by the caller.
pub async fn create_session(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SessionResponse>), SessionError> {
    let caller = auth::resolve_caller(&state, &headers).await?;
    let Json(body) = body.map_err(|rejection| SessionError::Validation(rejection.body_text()))?;

    let session = state
        .orchestrator
        .create(
            &caller,
            CreateSession {
                problem: body.problem,
                difficulty: body.difficulty,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(SessionResponse { session })))
}

/// GET /api/sessions/active — Active sessions, newest first.
pub async fn list_active(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<SessionListResponse>, SessionError> {
    auth::resolve_caller(&state, &headers).await?;

    let sessions = state.orchestrator.list_active(query.limit).await?;
    Ok(Json(SessionListResponse { sessions }))
}

/// GET /api/sessions/my-recent — Completed sessions the caller took part in.
pub async fn list_my_recent(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<SessionListResponse>, SessionError> {
    let caller = auth::resolve_caller(&state, &headers).await?;

    let sessions = state
        .orchestrator
        .list_recent(&caller, query.limit)
        .await?;
    Ok(Json(SessionListResponse { sessions }))
}

/// GET /api/sessions/{id}
pub async fn get_session(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<SessionViewResponse>, SessionError> {
    auth::resolve_caller(&state, &headers).await?;

    let session = state.orchestrator.get(&id).await?;
    Ok(Json(SessionViewResponse { session }))
}

/// POST /api/sessions/{id}/join
pub async fn join_session(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, SessionError> {
    let caller = auth::resolve_caller(&state, &headers).await?;

    let session = state.orchestrator.join(&caller, &id).await?;
    Ok(Json(SessionResponse { session }))
}

/// POST /api/sessions/{id}/end — Host only.
pub async fn end_session(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<EndSessionResponse>, SessionError> {
    let caller = auth::resolve_caller(&state, &headers).await?;

    let outcome = state.orchestrator.end(&caller, &id).await?;
    Ok(Json(EndSessionResponse {
        session: outcome.session,
        message: outcome.message,
    }))
}

/// GET /api/health — Unauthenticated liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
