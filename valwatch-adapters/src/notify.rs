//! Alert fan-out across notification channels.
//!
//! Each channel is attempted independently: a failed Telegram send does not
//! stop the email or Slack send for the same message. Failures are logged per
//! channel and reported back, never raised.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::AdapterError;

/// Kind of notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelKind {
    Telegram,
    Email,
    Slack,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Telegram => f.write_str("telegram"),
            ChannelKind::Email => f.write_str("email"),
            ChannelKind::Slack => f.write_str("slack"),
        }
    }
}

/// A single notification channel.
#[async_trait]
pub trait Notifier: Send + Sync + fmt::Debug {
    fn kind(&self) -> ChannelKind;

    async fn send(&self, message: &str) -> Result<(), AdapterError>;
}

/// Per-channel outcome of one [`Dispatcher::send_all`] call.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub results: Vec<(ChannelKind, Result<(), String>)>,
}

impl DispatchReport {
    /// Number of channels a send was attempted on.
    pub fn attempted(&self) -> usize {
        self.results.len()
    }

    /// Number of channels that accepted the message.
    pub fn delivered(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.is_ok()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = (ChannelKind, &str)> {
        self.results
            .iter()
            .filter_map(|(kind, r)| r.as_ref().err().map(|e| (*kind, e.as_str())))
    }
}

/// Sends a message to every configured channel.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel.
    pub fn with(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifiers.push(Arc::new(notifier));
        self
    }

    pub fn channels(&self) -> Vec<ChannelKind> {
        self.notifiers.iter().map(|n| n.kind()).collect()
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    /// Attempt delivery on every channel.
    pub async fn send_all(&self, message: &str) -> DispatchReport {
        let mut report = DispatchReport::default();

        for notifier in &self.notifiers {
            let kind = notifier.kind();
            let result = match notifier.send(message).await {
                Ok(()) => {
                    debug!(channel = %kind, "alert delivered");
                    Ok(())
                }
                Err(e) => {
                    warn!(channel = %kind, error = %e, "failed to send alert");
                    Err(e.to_string())
                }
            };
            report.results.push((kind, result));
        }

        report
    }
}
