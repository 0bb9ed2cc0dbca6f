// src/api/mod.rs — HTTP API for the session lifecycle

pub mod auth;
pub mod handlers;
pub mod types;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::infra::config::{AuthConfig, ServerConfig};
use crate::session::SessionOrchestrator;
use crate::storage::ProfileStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<SessionOrchestrator>,
    pub profiles: Arc<dyn ProfileStore>,
    pub identity_header: String,
    pub api_token: Option<String>,
}

impl ApiState {
    pub fn new(
        orchestrator: Arc<SessionOrchestrator>,
        profiles: Arc<dyn ProfileStore>,
        auth: &AuthConfig,
    ) -> Self {
        Self {
            orchestrator,
            profiles,
            identity_header: auth.identity_header.to_ascii_lowercase(),
            api_token: auth.api_token.clone(),
        }
    }
}

/// Build the axum router with all API routes.
pub fn build_router(state: ApiState, cors_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {origin}");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/api/sessions", post(handlers::create_session))
        .route("/api/sessions/active", get(handlers::list_active))
        .route("/api/sessions/my-recent", get(handlers::list_my_recent))
        .route("/api/sessions/{id}", get(handlers::get_session))
        .route("/api/sessions/{id}/join", post(handlers::join_session))
        .route("/api/sessions/{id}/end", post(handlers::end_session))
        .route("/api/health", get(handlers::health))
        .layer(cors)
        .with_state(state)
}

/// Serve the API until ctrl-c.
pub async fn start_server(config: &ServerConfig, state: ApiState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.bind, config.port);
    let router = build_router(state, &config.cors_origins);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("API server listening on http://{addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {e}");
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown signal received");
        })
        .await?;
    Ok(())
}
