//! # valwatch-types
//!
//! Core types shared by the valwatch crates: the chain-state records returned
//! by a validator's RPC endpoint, and the metric model the collector emits
//! and the exporter renders.
//!
//! ## Features
//!
//! - `serde`: (de)serialization of chain records from the JSON-RPC wire
//!   format (camelCase field names, epoch credits as nested arrays)
//!
//! ## Example
//!
//! ```rust
//! use valwatch_types::{MetricDesc, MetricSet};
//!
//! const CURRENT_SLOT: MetricDesc = MetricDesc::new(
//!     "solana_current_slot",
//!     "Current slot height",
//!     &["solana_current_slot"],
//! );
//!
//! let mut set = MetricSet::with_timestamp(1_703_160_000_000);
//! set.gauge(&CURRENT_SLOT, &["245000000"], 245_000_000.0);
//!
//! assert_eq!(set.len(), 1);
//! ```

mod chain;
mod metrics;

pub use chain::*;
pub use metrics::*;

/// Lamports per SOL; divides raw stake and balances into display units.
pub const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;
