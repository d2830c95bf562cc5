//! Metric emission model.
//!
//! A [`MetricSet`] is the output of one collection cycle: every gauge the
//! collector derived, plus explicit markers for gauges whose source query
//! failed. It is rebuilt every cycle and handed to the exporter wholesale.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Static description of a gauge family: name, help text, label keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDesc {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

impl MetricDesc {
    pub const fn new(
        name: &'static str,
        help: &'static str,
        labels: &'static [&'static str],
    ) -> Self {
        Self { name, help, labels }
    }
}

/// Value of one sample.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Gauge(f64),
    /// The source data could not be obtained this cycle. Distinct from a
    /// gauge reading zero.
    Unavailable(String),
}

impl MetricValue {
    pub fn as_gauge(&self) -> Option<f64> {
        match self {
            MetricValue::Gauge(v) => Some(*v),
            MetricValue::Unavailable(_) => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, MetricValue::Unavailable(_))
    }
}

/// One labelled sample of a gauge family.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// `(key, value)` pairs in the order of the family's label keys.
    pub labels: Vec<(String, String)>,
    pub value: MetricValue,
}

impl Sample {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// All samples of one gauge family.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    pub name: String,
    pub help: String,
    pub samples: Vec<Sample>,
}

/// Metrics produced by one collection cycle, keyed by family name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetricSet {
    /// Unix timestamp in milliseconds when the cycle started.
    pub timestamp_ms: u64,
    pub families: BTreeMap<String, MetricFamily>,
}

impl MetricSet {
    /// Create an empty set stamped with the current time.
    pub fn new() -> Self {
        Self::with_timestamp(current_timestamp_ms())
    }

    pub fn with_timestamp(timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            families: BTreeMap::new(),
        }
    }

    /// Record a gauge sample. `label_values` are positional, matching
    /// `desc.labels`.
    pub fn gauge(&mut self, desc: &MetricDesc, label_values: &[&str], value: f64) {
        self.push(desc, label_values, MetricValue::Gauge(value));
    }

    /// Record that `desc` could not be produced this cycle.
    pub fn unavailable(&mut self, desc: &MetricDesc, reason: impl Into<String>) {
        self.push(desc, &[], MetricValue::Unavailable(reason.into()));
    }

    fn push(&mut self, desc: &MetricDesc, label_values: &[&str], value: MetricValue) {
        debug_assert!(
            value.is_unavailable() || label_values.len() == desc.labels.len(),
            "label arity mismatch for {}",
            desc.name
        );

        let labels = desc
            .labels
            .iter()
            .zip(label_values)
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        self.families
            .entry(desc.name.to_string())
            .or_insert_with(|| MetricFamily {
                name: desc.name.to_string(),
                help: desc.help.to_string(),
                samples: Vec::new(),
            })
            .samples
            .push(Sample { labels, value });
    }

    pub fn get(&self, name: &str) -> Option<&MetricFamily> {
        self.families.get(name)
    }

    /// First gauge value recorded for a family, if any.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.get(name)?
            .samples
            .iter()
            .find_map(|s| s.value.as_gauge())
    }

    /// Gauge value of the sample whose label `key` equals `label_value`.
    pub fn value_with(&self, name: &str, key: &str, label_value: &str) -> Option<f64> {
        self.get(name)?
            .samples
            .iter()
            .find(|s| s.label(key) == Some(label_value))
            .and_then(|s| s.value.as_gauge())
    }

    /// Whether any sample of the family is marked unavailable.
    pub fn is_unavailable(&self, name: &str) -> bool {
        self.get(name)
            .map(|f| f.samples.iter().any(|s| s.value.is_unavailable()))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricFamily> {
        self.families.values()
    }
}

fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
