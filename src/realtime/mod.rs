// src/realtime/mod.rs — Realtime call + chat channel gateway
//
// Both realtime resources of a session are keyed by its call id. The
// gateway hides which provider hosts them.

pub mod local;
pub mod retry;
pub mod stream;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::infra::config::{RealtimeConfig, RealtimeProviderKind};
use crate::session::types::CallMetadata;

pub use local::LocalGateway;
pub use retry::{RetryConfig, RetryGateway};
pub use stream::StreamGateway;

/// The two externally hosted resources paired with a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RealtimeResource {
    Call,
    Channel,
}

impl RealtimeResource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RealtimeResource::Call => "call",
            RealtimeResource::Channel => "channel",
        }
    }
}

impl fmt::Display for RealtimeResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum RealtimeError {
    #[error("{resource} '{id}' not found")]
    NotFound {
        resource: RealtimeResource,
        id: String,
    },

    #[error("Provider rejected request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Provider unavailable: {message}")]
    Unavailable { message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl RealtimeError {
    pub fn is_retriable(&self) -> bool {
        match self {
            RealtimeError::Unavailable { .. } => true,
            RealtimeError::Rejected { status, .. } => *status == 429 || *status >= 500,
            RealtimeError::Transport(e) => e.is_timeout() || e.is_connect(),
            RealtimeError::NotFound { .. } => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RealtimeError::NotFound { .. })
    }
}

/// Operations on the realtime call and chat channel of a session.
///
/// `create_or_get_call` and `create_channel` must be idempotent: calling
/// them for resources that already exist succeeds without side effects.
#[async_trait]
pub trait RealtimeGateway: Send + Sync {
    fn id(&self) -> &str;

    async fn create_or_get_call(
        &self,
        call_id: &str,
        owner_provider_id: &str,
        metadata: &CallMetadata,
    ) -> Result<(), RealtimeError>;

    async fn delete_call(&self, call_id: &str, hard: bool) -> Result<(), RealtimeError>;

    async fn create_channel(
        &self,
        call_id: &str,
        name: &str,
        owner_provider_id: &str,
        initial_members: &[String],
    ) -> Result<(), RealtimeError>;

    async fn add_channel_member(&self, call_id: &str, provider_id: &str)
        -> Result<(), RealtimeError>;

    async fn delete_channel(&self, call_id: &str) -> Result<(), RealtimeError>;
}

/// Build the configured gateway, wrapped in the retry policy.
pub fn build_gateway(config: &RealtimeConfig) -> anyhow::Result<Arc<dyn RealtimeGateway>> {
    let inner: Arc<dyn RealtimeGateway> = match config.provider {
        RealtimeProviderKind::Local => {
            tracing::warn!("Using in-process realtime gateway; calls and channels are not real");
            Arc::new(LocalGateway::new())
        }
        RealtimeProviderKind::Stream => {
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| anyhow::anyhow!("realtime.api_key is not set"))?;
            let token = config.server_token().ok_or_else(|| {
                anyhow::anyhow!(
                    "Realtime server token missing. Set the {} environment variable.",
                    config.token_env
                )
            })?;
            Arc::new(StreamGateway::new(config, api_key, token)?)
        }
    };

    Ok(Arc::new(RetryGateway::with_config(
        inner,
        RetryConfig::from(&config.retry),
    )))
}
