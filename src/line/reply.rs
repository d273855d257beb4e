//! Messaging API reply delivery

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::error::DeliveryError;
use crate::line::messages::ReplyMessage;

pub const REPLY_ENDPOINT: &str = "https://api.line.me/v2/bot/message/reply";

#[async_trait]
pub trait ReplyClient: Send + Sync {
    async fn reply(
        &self,
        reply_token: &str,
        messages: &[ReplyMessage],
    ) -> Result<(), DeliveryError>;
}

pub struct LineReplyClient {
    http: reqwest::Client,
    access_token: String,
    endpoint: String,
}

impl LineReplyClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_endpoint(access_token, REPLY_ENDPOINT)
    }

    pub fn with_endpoint(access_token: impl Into<String>, endpoint: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            http,
            access_token: access_token.into(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ReplyClient for LineReplyClient {
    async fn reply(
        &self,
        reply_token: &str,
        messages: &[ReplyMessage],
    ) -> Result<(), DeliveryError> {
        if self.access_token.is_empty() {
            return Err(DeliveryError::MissingToken);
        }
        let body = json!({
            "replyToken": reply_token,
            "messages": messages.iter().map(ReplyMessage::to_json).collect::<Vec<_>>(),
        });

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }
        debug!("Replied with {} messages", messages.len());
        Ok(())
    }
}
