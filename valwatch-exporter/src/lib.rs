//! # valwatch-exporter
//!
//! Serves the latest [`MetricSet`] produced by the valwatch collector in the
//! Prometheus text exposition format.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use valwatch_exporter::{PrometheusConfig, PrometheusExporter};
//! use valwatch_types::MetricSet;
//!
//! #[tokio::main]
//! async fn main() {
//!     let exporter = PrometheusExporter::new(
//!         PrometheusConfig::builder().listen_address("0.0.0.0:9090").build(),
//!     );
//!     let server = exporter.start_server();
//!
//!     // Each collection cycle replaces the served metrics wholesale.
//!     exporter.record(MetricSet::new());
//!
//!     server.await.unwrap();
//! }
//! ```

pub mod prometheus;

pub use prometheus::{format_prometheus, PrometheusConfig, PrometheusConfigBuilder, PrometheusExporter};

pub use valwatch_types::{MetricDesc, MetricFamily, MetricSet, MetricValue, Sample};
