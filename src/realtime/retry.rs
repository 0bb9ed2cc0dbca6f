// src/realtime/retry.rs — Retry with exponential backoff for realtime providers
//
// Wraps any RealtimeGateway. Retries: rate limits (429), server errors (5xx),
// timeouts, connection failures. Does NOT retry: not-found, 4xx rejections.
// This is the calling policy layer; the orchestrator itself never retries.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{RealtimeError, RealtimeGateway};
use crate::infra::config::RetryTomlConfig;
use crate::session::types::CallMetadata;

const MAX_RETRIES: u32 = 2;
const INITIAL_DELAY_MS: u64 = 200;
const BACKOFF_FACTOR: f64 = 2.0;
const MAX_DELAY_MS: u64 = 2_000;
const JITTER_FRACTION: f64 = 0.2;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            initial_delay: Duration::from_millis(INITIAL_DELAY_MS),
            backoff_factor: BACKOFF_FACTOR,
            max_delay: Duration::from_millis(MAX_DELAY_MS),
            jitter_fraction: JITTER_FRACTION,
        }
    }
}

impl From<&RetryTomlConfig> for RetryConfig {
    fn from(cfg: &RetryTomlConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            initial_delay: Duration::from_millis(cfg.initial_delay_ms),
            max_delay: Duration::from_millis(cfg.max_delay_ms),
            ..Self::default()
        }
    }
}

/// A gateway wrapper that retries transient provider failures.
pub struct RetryGateway {
    inner: Arc<dyn RealtimeGateway>,
    config: RetryConfig,
}

impl RetryGateway {
    pub fn new(inner: Arc<dyn RealtimeGateway>) -> Self {
        Self {
            inner,
            config: RetryConfig::default(),
        }
    }

    pub fn with_config(inner: Arc<dyn RealtimeGateway>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// Delay before retry `attempt` (0-indexed).
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = self.config.initial_delay.as_millis() as f64
            * self.config.backoff_factor.powi(attempt as i32);
        let capped_ms = base_ms.min(self.config.max_delay.as_millis() as f64);
        let jitter = deterministic_jitter(attempt, self.config.jitter_fraction);
        Duration::from_millis((capped_ms * jitter).max(1.0) as u64)
    }

    async fn run<F, Fut>(&self, op: &'static str, call_id: &str, mut f: F) -> Result<(), RealtimeError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<(), RealtimeError>> + Send,
    {
        let mut attempt = 0;
        loop {
            match f().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    if !e.is_retriable() || attempt >= self.config.max_retries {
                        return Err(e);
                    }

                    let delay = self.delay_for_attempt(attempt);
                    tracing::warn!(
                        provider = self.inner.id(),
                        op,
                        call_id,
                        attempt = attempt + 1,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying realtime call after error: {}",
                        e
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Returns a multiplier in [1 - fraction, 1 + fraction], reproducible per attempt.
fn deterministic_jitter(attempt: u32, fraction: f64) -> f64 {
    let hash = (attempt.wrapping_mul(2654435761)) as f64 / u32::MAX as f64;
    1.0 + fraction * (2.0 * hash - 1.0)
}

#[async_trait]
impl RealtimeGateway for RetryGateway {
    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn create_or_get_call(
        &self,
        call_id: &str,
        owner_provider_id: &str,
        metadata: &CallMetadata,
    ) -> Result<(), RealtimeError> {
        self.run("create_call", call_id, || {
            self.inner
                .create_or_get_call(call_id, owner_provider_id, metadata)
        })
        .await
    }

    async fn delete_call(&self, call_id: &str, hard: bool) -> Result<(), RealtimeError> {
        self.run("delete_call", call_id, || self.inner.delete_call(call_id, hard))
            .await
    }

    async fn create_channel(
        &self,
        call_id: &str,
        name: &str,
        owner_provider_id: &str,
        initial_members: &[String],
    ) -> Result<(), RealtimeError> {
        self.run("create_channel", call_id, || {
            self.inner
                .create_channel(call_id, name, owner_provider_id, initial_members)
        })
        .await
    }

    async fn add_channel_member(
        &self,
        call_id: &str,
        provider_id: &str,
    ) -> Result<(), RealtimeError> {
        self.run("add_channel_member", call_id, || {
            self.inner.add_channel_member(call_id, provider_id)
        })
        .await
    }

    async fn delete_channel(&self, call_id: &str) -> Result<(), RealtimeError> {
        self.run("delete_channel", call_id, || self.inner.delete_channel(call_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::local::{LocalGateway, LocalOp};
    use crate::realtime::RealtimeResource;

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            ..RetryConfig::default()
        }
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let local = Arc::new(LocalGateway::new());
        local.fail_next(LocalOp::CreateChannel, 2);
        let gw = RetryGateway::with_config(local.clone(), fast_config(2));

        gw.create_channel("c1", "n", "h", &[]).await.unwrap();
        assert_eq!(local.invocations(LocalOp::CreateChannel), 3);
        assert!(local.channel("c1").is_some());
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let local = Arc::new(LocalGateway::new());
        local.fail_always(LocalOp::DeleteChannel);
        let gw = RetryGateway::with_config(local.clone(), fast_config(1));

        assert!(gw.delete_channel("c1").await.is_err());
        assert_eq!(local.invocations(LocalOp::DeleteChannel), 2);
    }

    #[tokio::test]
    async fn test_does_not_retry_not_found() {
        let local = Arc::new(LocalGateway::new());
        let gw = RetryGateway::with_config(local.clone(), fast_config(3));

        let err = gw.delete_call("missing", true).await.unwrap_err();
        assert!(matches!(
            err,
            RealtimeError::NotFound {
                resource: RealtimeResource::Call,
                ..
            }
        ));
        assert_eq!(local.invocations(LocalOp::DeleteCall), 1);
    }

    #[test]
    fn test_delay_exponential_and_capped() {
        let gw = RetryGateway::new(Arc::new(LocalGateway::new()));
        let d0 = gw.delay_for_attempt(0);
        let d1 = gw.delay_for_attempt(1);
        assert!(d0.as_millis() >= 160 && d0.as_millis() <= 240);
        assert!(d1.as_millis() >= 320 && d1.as_millis() <= 480);
        assert!(gw.delay_for_attempt(10).as_millis() <= 2_400);
    }

    #[test]
    fn test_from_toml_config() {
        let cfg = RetryConfig::from(&RetryTomlConfig {
            max_retries: 5,
            initial_delay_ms: 50,
            max_delay_ms: 500,
        });
        assert_eq!(cfg.max_retries, 5);
        assert_eq!(cfg.initial_delay, Duration::from_millis(50));
        assert_eq!(cfg.backoff_factor, 2.0);
    }
}
