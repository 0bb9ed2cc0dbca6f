// src/realtime/stream.rs — Stream chat + video REST adapter
//
// Chat:  POST   {chat}/channels/{type}/{id}/query    (get-or-create)
//        POST   {chat}/channels/{type}/{id}          (add_members)
//        DELETE {chat}/channels/{type}/{id}
// Video: POST   {video}/call/{type}/{id}             (get-or-create)
//        POST   {video}/call/{type}/{id}/delete
//
// Every request carries the api key as a query parameter and the server
// token in the Authorization header.

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;

use super::{RealtimeError, RealtimeGateway, RealtimeResource};
use crate::infra::config::RealtimeConfig;
use crate::session::call_id::is_valid_call_id;
use crate::session::types::CallMetadata;

pub struct StreamGateway {
    client: Client,
    api_key: String,
    server_token: String,
    chat_base_url: String,
    video_base_url: String,
    call_type: String,
    channel_type: String,
}

#[derive(Deserialize)]
struct ProviderErrorBody {
    message: Option<String>,
}

impl StreamGateway {
    pub fn new(
        config: &RealtimeConfig,
        api_key: String,
        server_token: String,
    ) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            api_key,
            server_token,
            chat_base_url: config.chat_base_url.trim_end_matches('/').to_string(),
            video_base_url: config.video_base_url.trim_end_matches('/').to_string(),
            call_type: config.call_type.clone(),
            channel_type: config.channel_type.clone(),
        })
    }

    fn channel_url(&self, call_id: &str) -> String {
        format!(
            "{}/channels/{}/{call_id}",
            self.chat_base_url, self.channel_type
        )
    }

    fn call_url(&self, call_id: &str) -> String {
        format!("{}/call/{}/{call_id}", self.video_base_url, self.call_type)
    }

    /// Send an authenticated request; map non-success statuses to `RealtimeError`.
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
        resource: RealtimeResource,
        call_id: &str,
    ) -> Result<(), RealtimeError> {
        if !is_valid_call_id(call_id) {
            return Err(RealtimeError::Rejected {
                status: 400,
                message: format!("invalid call id '{call_id}'"),
            });
        }

        let mut req = self
            .client
            .request(method, url)
            .query(&[("api_key", self.api_key.as_str())])
            .header("Authorization", &self.server_token)
            .header("stream-auth-type", "jwt");
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        if status == StatusCode::NOT_FOUND {
            return Err(RealtimeError::NotFound {
                resource,
                id: call_id.to_string(),
            });
        }

        let message = resp
            .json::<ProviderErrorBody>()
            .await
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| status.to_string());

        if status == StatusCode::SERVICE_UNAVAILABLE || status == StatusCode::BAD_GATEWAY {
            return Err(RealtimeError::Unavailable { message });
        }

        Err(RealtimeError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl RealtimeGateway for StreamGateway {
    fn id(&self) -> &str {
        "stream"
    }

    async fn create_or_get_call(
        &self,
        call_id: &str,
        owner_provider_id: &str,
        metadata: &CallMetadata,
    ) -> Result<(), RealtimeError> {
        let body = serde_json::json!({
            "data": {
                "created_by_id": owner_provider_id,
                "custom": {
                    "problem": metadata.problem,
                    "difficulty": metadata.difficulty,
                    "sessionId": metadata.session_id,
                },
            },
        });
        self.send(
            Method::POST,
            &self.call_url(call_id),
            Some(&body),
            RealtimeResource::Call,
            call_id,
        )
        .await
    }

    async fn delete_call(&self, call_id: &str, hard: bool) -> Result<(), RealtimeError> {
        let body = serde_json::json!({ "hard": hard });
        let url = format!("{}/delete", self.call_url(call_id));
        self.send(
            Method::POST,
            &url,
            Some(&body),
            RealtimeResource::Call,
            call_id,
        )
        .await
    }

    async fn create_channel(
        &self,
        call_id: &str,
        name: &str,
        owner_provider_id: &str,
        initial_members: &[String],
    ) -> Result<(), RealtimeError> {
        let body = serde_json::json!({
            "data": {
                "name": name,
                "created_by_id": owner_provider_id,
                "members": initial_members,
            },
        });
        let url = format!("{}/query", self.channel_url(call_id));
        self.send(
            Method::POST,
            &url,
            Some(&body),
            RealtimeResource::Channel,
            call_id,
        )
        .await
    }

    async fn add_channel_member(
        &self,
        call_id: &str,
        provider_id: &str,
    ) -> Result<(), RealtimeError> {
        let body = serde_json::json!({ "add_members": [provider_id] });
        self.send(
            Method::POST,
            &self.channel_url(call_id),
            Some(&body),
            RealtimeResource::Channel,
            call_id,
        )
        .await
    }

    async fn delete_channel(&self, call_id: &str) -> Result<(), RealtimeError> {
        self.send(
            Method::DELETE,
            &self.channel_url(call_id),
            None,
            RealtimeResource::Channel,
            call_id,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> StreamGateway {
        let config = RealtimeConfig {
            chat_base_url: "https://chat.example.com/".into(),
            video_base_url: "https://video.example.com/api/v2/video".into(),
            ..RealtimeConfig::default()
        };
        StreamGateway::new(&config, "key".into(), "token".into()).unwrap()
    }

    #[test]
    fn test_urls_share_call_id() {
        let gw = gateway();
        assert_eq!(
            gw.channel_url("session_1_ab"),
            "https://chat.example.com/channels/messaging/session_1_ab"
        );
        assert_eq!(
            gw.call_url("session_1_ab"),
            "https://video.example.com/api/v2/video/call/default/session_1_ab"
        );
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_retriable() {
        let config = RealtimeConfig {
            chat_base_url: "http://127.0.0.1:9".into(),
            timeout_seconds: 2,
            ..RealtimeConfig::default()
        };
        let gw = StreamGateway::new(&config, "key".into(), "token".into()).unwrap();
        let err = gw.delete_channel("session_1_ab").await.unwrap_err();
        assert!(matches!(err, RealtimeError::Transport(_)));
    }

    #[tokio::test]
    async fn test_invalid_call_id_rejected_locally() {
        let gw = gateway();
        let err = gw.delete_channel("../admin").await.unwrap_err();
        assert!(matches!(err, RealtimeError::Rejected { status: 400, .. }));
        assert!(!err.is_retriable());
    }
}
