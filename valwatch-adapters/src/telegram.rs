//! Telegram Bot API channel.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::notify::{ChannelKind, Notifier};
use crate::{check_status, http_client, AdapterError, DEFAULT_TIMEOUT};

/// Sends alerts to a Telegram chat through a bot.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: i64,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

impl TelegramNotifier {
    pub fn new(bot_token: impl Into<String>, chat_id: i64) -> Result<Self, AdapterError> {
        Self::with_timeout(bot_token, chat_id, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        bot_token: impl Into<String>,
        chat_id: i64,
        timeout: Duration,
    ) -> Result<Self, AdapterError> {
        Ok(Self {
            client: http_client(timeout)?,
            api_base: "https://api.telegram.org".to_string(),
            bot_token: bot_token.into(),
            chat_id,
        })
    }

    /// Point at a self-hosted Bot API server.
    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Telegram
    }

    async fn send(&self, message: &str) -> Result<(), AdapterError> {
        let body = SendMessage {
            chat_id: self.chat_id,
            text: message,
        };
        let response = self
            .client
            .post(self.send_message_url())
            .json(&body)
            .send()
            .await?;
        check_status(response, "telegram sendMessage").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_message_url() {
        let notifier = TelegramNotifier::new("123:abc", 42).unwrap();
        assert_eq!(
            notifier.send_message_url(),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );

        let notifier = notifier.api_base("http://localhost:8081/");
        assert_eq!(
            notifier.send_message_url(),
            "http://localhost:8081/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn test_payload_shape() {
        let body = SendMessage {
            chat_id: -100200,
            text: "validator is in DELINQUENT state",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["chat_id"], -100200);
        assert_eq!(json["text"], "validator is in DELINQUENT state");
    }
}
