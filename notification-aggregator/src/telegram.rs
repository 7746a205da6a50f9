//! Telegram Bot API push channel.
//!
//! Sends messages via `POST /bot<token>/sendMessage`. The token is part of
//! the URL, so request URLs are stripped from every error before it leaves
//! this module.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use crate::dispatcher::PushChannel;
use crate::registry::DeliveryTarget;
use crate::types::{AggregatorError, Result, TelegramConfig};

pub struct TelegramChannel {
    config: TelegramConfig,
    client: Client,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { config, client })
    }

    fn send_message_url(&self, token: &str) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.config.api_base.trim_end_matches('/'),
            token
        )
    }
}

#[async_trait]
impl PushChannel for TelegramChannel {
    fn channel_type(&self) -> &'static str {
        "telegram"
    }

    fn is_enabled(&self) -> bool {
        self.config.bot_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    async fn send(&self, target: &DeliveryTarget, text: &str) -> Result<()> {
        let Some(token) = self.config.bot_token.as_deref() else {
            return Err(AggregatorError::Config("Telegram bot token not configured".to_string()));
        };

        let payload = json!({
            "chat_id": target,
            "text": text,
        });

        let response = self
            .client
            .post(self.send_message_url(token))
            .json(&payload)
            .send()
            .await
            .map_err(|e| AggregatorError::Http(e.without_url()))?;

        let status = response.status();
        if status.is_success() {
            debug!("Telegram accepted message for chat {}", target);
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let description = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("description").and_then(|d| d.as_str()).map(str::to_string))
            .unwrap_or(body);

        Err(AggregatorError::General(format!(
            "Telegram sendMessage failed for chat {}: {} - {}",
            target, status, description
        )))
    }
}
