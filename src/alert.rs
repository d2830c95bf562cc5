//! Scheduled status alerts with per-window deduplication.
//!
//! Status alerts go out at configured times of day ("alert windows"). The
//! collector evaluates the scheduler every cycle, so several cycles may land
//! in the same minute; the [`DedupSignal`] records which windows have already
//! been served so each window produces at most one dispatch.
//!
//! ```text
//! evaluate(now) ──▶ is_alert_tick ──▶ None ────────────────▶ NoTick
//!                        │
//!                        ▼ Some(window)
//!                   dedup.state(window)
//!                        ├─ NotSent ─▶ dispatch, mark sent ─▶ Sent { sequence }
//!                        ├─ AlreadySent ────────────────────▶ AlreadySent
//!                        └─ Unknown / error ────────────────▶ Unknown (skip)
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use valwatch_adapters::Dispatcher;
use valwatch_types::MetricSet;

use crate::config::ConfigError;
use crate::descs;

/// Times of day at which a status alert is due, at minute resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertWindowConfig {
    slots: BTreeSet<NaiveTime>,
}

impl AlertWindowConfig {
    /// Parse 12-hour clock strings such as `"10:00AM"` or `"3:04PM"`.
    pub fn parse<S: AsRef<str>>(values: &[S]) -> Result<Self, ConfigError> {
        let slots = values
            .iter()
            .map(|v| parse_kitchen(v.as_ref()))
            .collect::<Result<_, _>>()?;
        Ok(Self { slots })
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        self.slots.contains(&time)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NaiveTime> {
        self.slots.iter()
    }
}

fn parse_kitchen(value: &str) -> Result<NaiveTime, ConfigError> {
    let compact: String = value.split_whitespace().collect();
    NaiveTime::parse_from_str(&compact.to_ascii_uppercase(), "%I:%M%p").map_err(|_| {
        ConfigError::AlertTime {
            value: value.to_string(),
        }
    })
}

/// A concrete occurrence of an alert slot: the UTC date plus the slot time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AlertWindow {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl fmt::Display for AlertWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date, self.time.format("%-I:%M%p"))
    }
}

/// Whether `now` falls on a configured alert slot.
pub fn is_alert_tick(now: DateTime<Utc>, slots: &AlertWindowConfig) -> Option<AlertWindow> {
    let time = NaiveTime::from_hms_opt(now.hour(), now.minute(), 0)?;
    slots.contains(time).then(|| AlertWindow {
        date: now.date_naive(),
        time,
    })
}

/// Whether a window's alert has gone out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupState {
    NotSent,
    AlreadySent,
    Unknown,
}

impl DedupState {
    /// Normalise a textual `"true"` / `"false"` flag. Anything else is
    /// `Unknown`, never `NotSent`.
    pub fn from_flag(flag: &str) -> Self {
        match flag.trim() {
            "true" => DedupState::AlreadySent,
            "false" => DedupState::NotSent,
            _ => DedupState::Unknown,
        }
    }
}

#[derive(Debug, Error)]
pub enum DedupError {
    #[error("dedup signal unavailable: {0}")]
    Unavailable(String),
}

/// Records which alert windows have been served.
#[async_trait]
pub trait DedupSignal: Send + Sync {
    async fn state(&self, window: &AlertWindow) -> Result<DedupState, DedupError>;

    async fn mark_sent(&self, window: &AlertWindow) -> Result<(), DedupError>;
}

/// In-process dedup store. Windows from days before the most recently marked
/// one are pruned on every write.
#[derive(Debug, Default)]
pub struct LocalDedupStore {
    sent: Mutex<BTreeSet<AlertWindow>>,
}

impl LocalDedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }
}

#[async_trait]
impl DedupSignal for LocalDedupStore {
    async fn state(&self, window: &AlertWindow) -> Result<DedupState, DedupError> {
        Ok(if self.sent.lock().contains(window) {
            DedupState::AlreadySent
        } else {
            DedupState::NotSent
        })
    }

    async fn mark_sent(&self, window: &AlertWindow) -> Result<(), DedupError> {
        let mut sent = self.sent.lock();
        sent.retain(|w| w.date >= window.date);
        sent.insert(*window);
        Ok(())
    }
}

/// Result of one scheduler evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The message was dispatched; `sequence` counts status alerts sent since
    /// startup.
    Sent { sequence: u64 },
    AlreadySent,
    /// The dedup signal could not be read; the tick was skipped.
    Unknown,
    NoTick,
}

/// Sends status alerts at most once per alert window.
pub struct AlertScheduler {
    windows: AlertWindowConfig,
    dedup: Arc<dyn DedupSignal>,
    dispatcher: Dispatcher,
    sequence: AtomicU64,
}

impl fmt::Debug for AlertScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertScheduler")
            .field("windows", &self.windows)
            .field("channels", &self.dispatcher.channels())
            .field("sequence", &self.sequence())
            .finish()
    }
}

impl AlertScheduler {
    pub fn new(
        windows: AlertWindowConfig,
        dedup: Arc<dyn DedupSignal>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            windows,
            dedup,
            dispatcher,
            sequence: AtomicU64::new(0),
        }
    }

    /// Scheduler backed by a [`LocalDedupStore`].
    pub fn local(windows: AlertWindowConfig, dispatcher: Dispatcher) -> Self {
        Self::new(windows, Arc::new(LocalDedupStore::new()), dispatcher)
    }

    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Dispatch `message` if `now` opens a window that has not been served,
    /// and record the outcome as `solana_val_alert_count`.
    pub async fn evaluate(&self, now: DateTime<Utc>, message: &str, set: &mut MetricSet) -> Outcome {
        let Some(window) = is_alert_tick(now, &self.windows) else {
            return Outcome::NoTick;
        };

        let state = match self.dedup.state(&window).await {
            Ok(state) => state,
            Err(e) => {
                warn!(%window, error = %e, "skipping status alert");
                DedupState::Unknown
            }
        };

        match state {
            DedupState::NotSent => {
                let report = self.dispatcher.send_all(message).await;
                if let Err(e) = self.dedup.mark_sent(&window).await {
                    warn!(%window, error = %e, "failed to record sent status alert");
                }
                let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
                info!(
                    %window,
                    sequence,
                    delivered = report.delivered(),
                    attempted = report.attempted(),
                    "status alert sent"
                );
                set.gauge(&descs::ALERT_COUNT, &["true"], sequence as f64);
                Outcome::Sent { sequence }
            }
            DedupState::AlreadySent => {
                debug!(%window, "status alert already sent");
                set.gauge(&descs::ALERT_COUNT, &["false"], self.sequence() as f64);
                Outcome::AlreadySent
            }
            DedupState::Unknown => {
                set.unavailable(&descs::ALERT_COUNT, "dedup state unknown");
                Outcome::Unknown
            }
        }
    }

    /// Send an unscheduled alert (delinquency, new epoch) on every channel.
    pub async fn notify(&self, message: &str) {
        let report = self.dispatcher.send_all(message).await;
        debug!(
            delivered = report.delivered(),
            attempted = report.attempted(),
            "alert dispatched"
        );
    }
}
