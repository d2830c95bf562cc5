//! # valwatch
//!
//! Health monitor for a single Solana validator. Each collection cycle
//! queries the validator's own RPC node and a network RPC endpoint, derives
//! comparative metrics (vote height, vote credits, block time), publishes
//! them for Prometheus and sends status, delinquency and new-epoch alerts.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                          Collector                             │
//! │  ┌────────────┐   ┌───────────┐   ┌───────────┐   ┌──────────┐ │
//! │  │ ChainQuery │──▶│  compute  │──▶│ MetricSet │──▶│ Exporter │ │
//! │  │ (+ cache)  │   │  (pure)   │   │           │   │ /metrics │ │
//! │  └────────────┘   └─────┬─────┘   └───────────┘   └──────────┘ │
//! │                         │                                      │
//! │                         ▼                                      │
//! │                  ┌──────────────┐    ┌────────────┐            │
//! │                  │AlertScheduler│───▶│ Dispatcher │──▶ channels│
//! │                  │  (+ dedup)   │    └────────────┘            │
//! │                  └──────────────┘                              │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`cache`]**: [`TtlCache`], single-flight cache for epoch info
//! - **[`compute`]**: pure metric derivations (stake, credits, vote height,
//!   block time, voting status)
//! - **[`alert`]**: alert windows, [`DedupSignal`] and the [`AlertScheduler`]
//! - **[`collector`]**: the per-cycle orchestrator
//! - **[`config`]**: `config.toml` loading and validation
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Serve metrics using ./config.toml (or ~/.solana-mc/config/config.toml)
//! valwatch
//!
//! # Run a single cycle and print the exposition text
//! valwatch --config /etc/valwatch/config.toml --once
//! ```
//!
//! ### As a library
//!
//! ```no_run
//! use std::sync::Arc;
//! use valwatch::{AlertScheduler, AlertWindowConfig, Collector, CollectorSettings};
//! use valwatch_adapters::{Dispatcher, RpcGateway};
//!
//! # tokio_test::block_on(async {
//! let gateway = RpcGateway::builder()
//!     .validator_endpoint("http://localhost:8899")
//!     .network_endpoint("https://api.mainnet-beta.solana.com")
//!     .build()
//!     .unwrap();
//!
//! let windows = AlertWindowConfig::parse(&["10:00AM", "6:00PM"]).unwrap();
//! let scheduler = AlertScheduler::local(windows, Dispatcher::new());
//! let settings = CollectorSettings::new("NodeIdentity111", "VoteAccount111");
//!
//! let mut collector = Collector::new(Arc::new(gateway), settings, scheduler);
//! let metrics = collector.collect().await;
//! println!("{}", valwatch_exporter::format_prometheus(&metrics));
//! # });
//! ```

pub mod alert;
pub mod cache;
pub mod collector;
pub mod compute;
pub mod config;
pub mod descs;

// Re-export main types for convenience
pub use alert::{
    is_alert_tick, AlertScheduler, AlertWindow, AlertWindowConfig, DedupError, DedupSignal,
    DedupState, LocalDedupStore, Outcome,
};
pub use cache::{TtlCache, EPOCH_INFO_TTL};
pub use collector::{Collector, CollectorSettings};
pub use compute::{VoteHeight, VotingStatus};
pub use config::{ConfigError, Settings};
