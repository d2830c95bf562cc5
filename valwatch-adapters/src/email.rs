//! SendGrid email channel.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::notify::{ChannelKind, Notifier};
use crate::{check_status, http_client, AdapterError, DEFAULT_TIMEOUT};

const SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";

/// Sends alerts by email through the SendGrid v3 API.
#[derive(Debug, Clone)]
pub struct EmailNotifier {
    client: Client,
    endpoint: String,
    token: String,
    from_email: String,
    from_name: String,
    to_email: String,
    subject: String,
}

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: Vec<Address<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
struct Mail<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: Address<'a>,
    subject: &'a str,
    content: Vec<Content<'a>>,
}

impl EmailNotifier {
    pub fn new(
        token: impl Into<String>,
        from_email: impl Into<String>,
        from_name: impl Into<String>,
        to_email: impl Into<String>,
    ) -> Result<Self, AdapterError> {
        Self::with_timeout(token, from_email, from_name, to_email, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        token: impl Into<String>,
        from_email: impl Into<String>,
        from_name: impl Into<String>,
        to_email: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AdapterError> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint: SENDGRID_ENDPOINT.to_string(),
            token: token.into(),
            from_email: from_email.into(),
            from_name: from_name.into(),
            to_email: to_email.into(),
            subject: "Solana validator alert".to_string(),
        })
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    fn mail<'a>(&'a self, message: &'a str) -> Mail<'a> {
        Mail {
            personalizations: vec![Personalization {
                to: vec![Address {
                    email: self.to_email.as_str(),
                    name: None,
                }],
            }],
            from: Address {
                email: self.from_email.as_str(),
                name: Some(self.from_name.as_str()),
            },
            subject: self.subject.as_str(),
            content: vec![Content {
                kind: "text/plain",
                value: message,
            }],
        }
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn send(&self, message: &str) -> Result<(), AdapterError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&self.mail(message))
            .send()
            .await?;
        check_status(response, "sendgrid mail/send").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mail_payload() {
        let notifier = EmailNotifier::new("SG.token", "ops@example.com", "Ops", "me@example.com")
            .unwrap()
            .subject("mainnet validator");

        let json = serde_json::to_value(notifier.mail("validator is VOTING")).unwrap();

        assert_eq!(json["personalizations"][0]["to"][0]["email"], "me@example.com");
        assert!(json["personalizations"][0]["to"][0].get("name").is_none());
        assert_eq!(json["from"]["email"], "ops@example.com");
        assert_eq!(json["from"]["name"], "Ops");
        assert_eq!(json["subject"], "mainnet validator");
        assert_eq!(json["content"][0]["type"], "text/plain");
        assert_eq!(json["content"][0]["value"], "validator is VOTING");
    }

    #[test]
    fn test_kind() {
        let notifier = EmailNotifier::new("t", "a@b.c", "n", "d@e.f").unwrap();
        assert_eq!(notifier.kind(), ChannelKind::Email);
    }
}
