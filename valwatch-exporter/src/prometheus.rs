//! Prometheus exposition format support.
//!
//! The exporter keeps only the most recent [`MetricSet`]; a scrape renders
//! whatever the last collection cycle produced. Gauges whose source query
//! failed are not rendered as numbers. They appear as an `# UNAVAILABLE`
//! comment and as a sample of `valwatch_metric_unavailable`, so dashboards
//! can tell a missing reading from a zero.

use std::convert::Infallible;
use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use parking_lot::RwLock;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use valwatch_types::{MetricSet, MetricValue};

const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";
const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:9090";
const DEFAULT_METRICS_PATH: &str = "/metrics";

/// Where the exposition endpoint listens. Mirrors the `[prometheus]`
/// section of `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrometheusConfig {
    /// Socket address, `host:port`.
    pub listen_address: String,
    /// Request path that returns the exposition text.
    pub metrics_path: String,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            listen_address: DEFAULT_LISTEN_ADDRESS.to_string(),
            metrics_path: DEFAULT_METRICS_PATH.to_string(),
        }
    }
}

impl PrometheusConfig {
    pub fn builder() -> PrometheusConfigBuilder {
        PrometheusConfigBuilder::default()
    }
}

/// Builder for [`PrometheusConfig`]; unset fields fall back to the defaults.
#[derive(Debug, Default)]
pub struct PrometheusConfigBuilder {
    listen_address: Option<String>,
    metrics_path: Option<String>,
}

impl PrometheusConfigBuilder {
    pub fn listen_address(mut self, address: impl Into<String>) -> Self {
        self.listen_address = Some(address.into());
        self
    }

    pub fn metrics_path(mut self, path: impl Into<String>) -> Self {
        self.metrics_path = Some(path.into());
        self
    }

    pub fn build(self) -> PrometheusConfig {
        PrometheusConfig {
            listen_address: self
                .listen_address
                .unwrap_or_else(|| DEFAULT_LISTEN_ADDRESS.to_string()),
            metrics_path: self
                .metrics_path
                .unwrap_or_else(|| DEFAULT_METRICS_PATH.to_string()),
        }
    }
}

type Storage = Arc<RwLock<Option<MetricSet>>>;

/// Holds the metric set of the latest collection cycle and serves it.
///
/// Clones share the same storage, so the collector can record into one
/// handle while the HTTP server reads from another.
#[derive(Debug, Clone)]
pub struct PrometheusExporter {
    config: PrometheusConfig,
    latest: Storage,
}

impl PrometheusExporter {
    pub fn new(config: PrometheusConfig) -> Self {
        Self {
            config,
            latest: Arc::new(RwLock::new(None)),
        }
    }

    pub fn config(&self) -> &PrometheusConfig {
        &self.config
    }

    /// Replace the served metric set with the output of a new cycle.
    pub fn record(&self, set: MetricSet) {
        *self.latest.write() = Some(set);
    }

    /// Exposition text for the latest cycle; empty before the first one.
    pub fn render(&self) -> String {
        render_latest(&self.latest)
    }

    /// Spawn the HTTP listener on the current runtime.
    ///
    /// The returned task only completes if the listener fails (bad address,
    /// port in use, accept error); the error is logged.
    pub fn start_server(&self) -> tokio::task::JoinHandle<()> {
        let config = self.config.clone();
        let latest = self.latest.clone();

        tokio::spawn(async move {
            if let Err(e) = serve(config, latest).await {
                error!(error = %e, "prometheus listener stopped");
            }
        })
    }
}

async fn serve(
    config: PrometheusConfig,
    latest: Storage,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr: SocketAddr = config.listen_address.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, path = %config.metrics_path, "prometheus endpoint listening");

    let metrics_path: Arc<str> = Arc::from(config.metrics_path);
    loop {
        let (stream, peer) = listener.accept().await?;
        let metrics_path = metrics_path.clone();
        let latest = latest.clone();

        tokio::spawn(async move {
            let handler = service_fn(move |req: Request<Incoming>| {
                let response = route(req.uri().path(), &metrics_path, &latest);
                async move { Ok::<_, Infallible>(response) }
            });

            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), handler)
                .await
            {
                debug!(%peer, error = %e, "scrape connection closed with error");
            }
        });
    }
}

fn route(path: &str, metrics_path: &str, latest: &Storage) -> Response<Full<Bytes>> {
    if path == metrics_path {
        text_response(StatusCode::OK, EXPOSITION_CONTENT_TYPE, render_latest(latest))
    } else if path == "/health" || path == "/healthz" {
        text_response(StatusCode::OK, "text/plain", "OK".to_string())
    } else {
        text_response(StatusCode::NOT_FOUND, "text/plain", "Not Found".to_string())
    }
}

fn text_response(status: StatusCode, content_type: &'static str, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn render_latest(latest: &Storage) -> String {
    match latest.read().as_ref() {
        Some(set) => format_prometheus(set),
        None => String::new(),
    }
}

/// Format a metric set as Prometheus exposition format.
pub fn format_prometheus(set: &MetricSet) -> String {
    let mut out = String::new();
    let mut unavailable = Vec::new();

    for family in set.iter() {
        let _ = writeln!(out, "# HELP {} {}", family.name, escape_help(&family.help));
        let _ = writeln!(out, "# TYPE {} gauge", family.name);

        for sample in &family.samples {
            match &sample.value {
                MetricValue::Gauge(v) => {
                    out.push_str(&family.name);
                    if !sample.labels.is_empty() {
                        let labels = sample
                            .labels
                            .iter()
                            .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
                            .collect::<Vec<_>>()
                            .join(",");
                        let _ = write!(out, "{{{}}}", labels);
                    }
                    let _ = writeln!(out, " {}", format_value(*v));
                }
                MetricValue::Unavailable(reason) => {
                    let _ = writeln!(
                        out,
                        "# UNAVAILABLE {}: {}",
                        family.name,
                        reason.replace('\n', " ")
                    );
                    if !unavailable.contains(&family.name) {
                        unavailable.push(family.name.clone());
                    }
                }
            }
        }
    }

    if !unavailable.is_empty() {
        out.push_str(
            "# HELP valwatch_metric_unavailable Metric families whose source query failed in the last cycle\n",
        );
        out.push_str("# TYPE valwatch_metric_unavailable gauge\n");
        for name in &unavailable {
            let _ = writeln!(
                out,
                "valwatch_metric_unavailable{{metric=\"{}\"}} 1",
                escape_label_value(name)
            );
        }
    }

    out.push_str(
        "# HELP valwatch_last_collection_timestamp_seconds Unix timestamp of the last collection cycle\n",
    );
    out.push_str("# TYPE valwatch_last_collection_timestamp_seconds gauge\n");
    let _ = writeln!(
        out,
        "valwatch_last_collection_timestamp_seconds {:.3}",
        set.timestamp_ms as f64 / 1000.0
    );

    out
}

fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "+Inf" } else { "-Inf" }.to_string()
    } else {
        v.to_string()
    }
}

fn escape_label_value(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn escape_help(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use valwatch_types::MetricDesc;

    const ACTIVE: MetricDesc = MetricDesc::new(
        "solana_active_validators",
        "Total number of active validators by state",
        &["state"],
    );
    const LEADER: MetricDesc = MetricDesc::new(
        "solana_slot_leader",
        "Current slot leader",
        &["solana_slot_leader"],
    );
    const DIFF: MetricDesc = MetricDesc::new(
        "solana_vote_height_diff",
        "solana vote height difference of validator and network",
        &["solana_vote_height_diff"],
    );

    fn create_test_set() -> MetricSet {
        let mut set = MetricSet::with_timestamp(1703160000000);
        set.gauge(&ACTIVE, &["current"], 1500.0);
        set.gauge(&ACTIVE, &["delinquent"], 12.0);
        set.gauge(&DIFF, &["vote height difference"], 3.0);
        set
    }

    #[test]
    fn test_gauge_samples_with_labels() {
        let output = format_prometheus(&create_test_set());

        assert!(output.contains("solana_active_validators{state=\"current\"} 1500\n"));
        assert!(output.contains("solana_active_validators{state=\"delinquent\"} 12\n"));
        assert!(output
            .contains("solana_vote_height_diff{solana_vote_height_diff=\"vote height difference\"} 3\n"));
    }

    #[test]
    fn test_help_and_type_once_per_family() {
        let output = format_prometheus(&create_test_set());

        assert!(output.contains(
            "# HELP solana_active_validators Total number of active validators by state"
        ));
        assert!(output.contains("# TYPE solana_active_validators gauge"));
        assert_eq!(output.matches("# TYPE solana_active_validators").count(), 1);
    }

    #[test]
    fn test_collection_timestamp_gauge() {
        let output = format_prometheus(&create_test_set());

        assert!(output.contains("valwatch_last_collection_timestamp_seconds 1703160000.000"));
    }

    #[test]
    fn test_unavailable_is_not_rendered_as_value() {
        let mut set = create_test_set();
        set.unavailable(&LEADER, "Request timed out");

        let output = format_prometheus(&set);

        assert!(output.contains("# UNAVAILABLE solana_slot_leader: Request timed out"));
        assert!(!output.contains("solana_slot_leader{"));
        assert!(output.contains("valwatch_metric_unavailable{metric=\"solana_slot_leader\"} 1"));
    }

    #[test]
    fn test_fractional_values() {
        let mut set = MetricSet::with_timestamp(0);
        set.gauge(&DIFF, &["x"], 0.25);
        assert!(format_prometheus(&set).contains("} 0.25\n"));
    }

    #[test]
    fn test_label_values_are_escaped() {
        let mut set = MetricSet::with_timestamp(0);
        set.gauge(&LEADER, &["say \"hi\"\\\n"], 1.0);

        let output = format_prometheus(&set);
        assert!(output.contains(r#"solana_slot_leader{solana_slot_leader="say \"hi\"\\\n"} 1"#));
    }

    #[test]
    fn test_format_value_special() {
        assert_eq!(format_value(f64::NAN), "NaN");
        assert_eq!(format_value(f64::INFINITY), "+Inf");
        assert_eq!(format_value(-5.5), "-5.5");
    }

    #[test]
    fn test_builder_falls_back_to_defaults() {
        let config = PrometheusConfig::builder().metrics_path("/solana").build();

        assert_eq!(config.listen_address, "0.0.0.0:9090");
        assert_eq!(config.metrics_path, "/solana");
        assert_eq!(PrometheusConfig::builder().build(), PrometheusConfig::default());
    }

    #[test]
    fn test_exporter_record_and_render() {
        let exporter = PrometheusExporter::new(PrometheusConfig::default());

        assert!(exporter.render().is_empty());

        exporter.record(create_test_set());
        assert!(exporter.render().contains("solana_active_validators"));

        // A new cycle replaces the previous set entirely.
        exporter.record(MetricSet::with_timestamp(0));
        assert!(!exporter.render().contains("solana_active_validators"));
    }

    #[test]
    fn test_routes() {
        let latest: Storage = Arc::new(RwLock::new(Some(create_test_set())));

        let metrics = route("/metrics", "/metrics", &latest);
        assert_eq!(metrics.status(), StatusCode::OK);
        assert_eq!(
            metrics.headers().get(CONTENT_TYPE).unwrap(),
            EXPOSITION_CONTENT_TYPE
        );

        assert_eq!(route("/healthz", "/metrics", &latest).status(), StatusCode::OK);
        assert_eq!(route("/nope", "/metrics", &latest).status(), StatusCode::NOT_FOUND);
    }
}
