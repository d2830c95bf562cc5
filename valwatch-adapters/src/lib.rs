//! # valwatch-adapters
//!
//! The I/O edges of valwatch: a JSON-RPC gateway for querying chain state
//! from the tracked validator and from the wider network, and the
//! notification channels alerts are delivered through.
//!
//! ## Components
//!
//! - [`rpc`] - [`ChainQuery`] trait and the [`RpcGateway`] JSON-RPC client
//! - [`notify`] - [`Notifier`] trait and the fan-out [`Dispatcher`]
//! - [`telegram`], [`email`], [`slack`] - concrete notification channels
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use valwatch_adapters::{ChainQuery, RpcGateway};
//! use valwatch_types::Target;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gateway = RpcGateway::builder()
//!         .validator_endpoint("http://localhost:8899")
//!         .network_endpoint("https://api.mainnet-beta.solana.com")
//!         .build()?;
//!
//!     let info = gateway.epoch_info(Target::Validator).await?;
//!     println!("epoch {} at slot {}", info.epoch, info.absolute_slot);
//!     Ok(())
//! }
//! ```

use std::time::Duration;

pub mod email;
pub mod error;
pub mod notify;
pub mod rpc;
pub mod slack;
pub mod telegram;

pub use email::EmailNotifier;
pub use error::AdapterError;
pub use notify::{ChannelKind, DispatchReport, Dispatcher, Notifier};
pub use rpc::{ChainQuery, RpcGateway, RpcGatewayBuilder};
pub use slack::SlackNotifier;
pub use telegram::TelegramNotifier;

/// Default upstream timeout for RPC calls and notification sends.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, AdapterError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AdapterError::Client(e.to_string()))
}

/// Turn a non-2xx response into an error carrying the status and body.
pub(crate) async fn check_status(
    response: reqwest::Response,
    what: &str,
) -> Result<reqwest::Response, AdapterError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AdapterError::Http(format!(
        "{} returned status {}: {}",
        what,
        status,
        body.trim()
    )))
}
