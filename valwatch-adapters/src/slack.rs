//! Slack incoming-webhook channel.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::notify::{ChannelKind, Notifier};
use crate::{check_status, http_client, AdapterError, DEFAULT_TIMEOUT};

/// Posts alerts to a Slack incoming webhook.
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    client: Client,
    webhook_url: String,
}

#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    text: &'a str,
}

impl SlackNotifier {
    pub fn new(webhook_url: impl Into<String>) -> Result<Self, AdapterError> {
        Self::with_timeout(webhook_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        webhook_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AdapterError> {
        Ok(Self {
            client: http_client(timeout)?,
            webhook_url: webhook_url.into(),
        })
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Slack
    }

    async fn send(&self, message: &str) -> Result<(), AdapterError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&WebhookMessage { text: message })
            .send()
            .await?;
        check_status(response, "slack webhook").await?;
        Ok(())
    }
}
