//! Metric descriptors, samples and the per-scrape sink
//!
//! Collectors never talk to the exposition layer directly. They describe their
//! metrics once with a [`MetricDesc`] and push [`Sample`]s into a [`MetricSink`]
//! while a scrape is running. The sink is a cheap clone of one unbounded channel,
//! so any number of collector tasks can send into the same scrape concurrently;
//! every sample travels as one message and is never split or interleaved.

use std::sync::{Arc, LazyLock};

use prometheus::Opts;
use regex::Regex;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::trace;

static NAMESPACE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z_:][a-zA-Z0-9_:]*$").expect("namespace pattern is valid")
});

/// Whether `namespace` can prefix a metric name in the exposition format
///
/// The empty namespace is valid: names then start at the subsystem.
pub fn is_valid_namespace(namespace: &str) -> bool {
    namespace.is_empty() || NAMESPACE_PATTERN.is_match(namespace)
}

/// How the exposition layer should type a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Gauge,
    Counter,
}

/// Static metadata of one metric family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDesc {
    fq_name: String,
    help: String,
    labels: Vec<String>,
}

impl MetricDesc {
    /// Create a descriptor named `namespace_subsystem_name`
    ///
    /// Empty parts are skipped, so `("", "scrape", "x")` becomes `scrape_x`.
    pub fn new(
        namespace: &str,
        subsystem: &str,
        name: &str,
        help: impl Into<String>,
        labels: &[&str],
    ) -> Self {
        let help = help.into();
        let fq_name = Opts::new(name, help.as_str())
            .namespace(namespace)
            .subsystem(subsystem)
            .fq_name();

        Self {
            fq_name,
            help,
            labels: labels.iter().map(|label| label.to_string()).collect(),
        }
    }

    pub fn fq_name(&self) -> &str {
        &self.fq_name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    /// Names of the variable labels, in the order values must be supplied
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SampleError {
    #[error("metric {name} expects {expected} label values, got {actual}")]
    LabelMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
}

/// One value of a metric family at scrape time
#[derive(Debug, Clone)]
pub struct Sample {
    desc: Arc<MetricDesc>,
    label_values: Vec<String>,
    value: f64,
    value_type: ValueType,
}

impl Sample {
    pub fn new(
        desc: &Arc<MetricDesc>,
        value_type: ValueType,
        value: f64,
        label_values: &[&str],
    ) -> Result<Self, SampleError> {
        if desc.labels.len() != label_values.len() {
            return Err(SampleError::LabelMismatch {
                name: desc.fq_name.clone(),
                expected: desc.labels.len(),
                actual: label_values.len(),
            });
        }

        Ok(Self {
            desc: Arc::clone(desc),
            label_values: label_values.iter().map(|value| value.to_string()).collect(),
            value,
            value_type,
        })
    }

    pub fn gauge(
        desc: &Arc<MetricDesc>,
        value: f64,
        label_values: &[&str],
    ) -> Result<Self, SampleError> {
        Self::new(desc, ValueType::Gauge, value, label_values)
    }

    pub fn counter(
        desc: &Arc<MetricDesc>,
        value: f64,
        label_values: &[&str],
    ) -> Result<Self, SampleError> {
        Self::new(desc, ValueType::Counter, value, label_values)
    }

    pub fn desc(&self) -> &Arc<MetricDesc> {
        &self.desc
    }

    pub fn fq_name(&self) -> &str {
        self.desc.fq_name()
    }

    pub fn label_values(&self) -> &[String] {
        &self.label_values
    }

    /// Look up a label value by label name
    pub fn label(&self, name: &str) -> Option<&str> {
        self.desc
            .labels
            .iter()
            .position(|label| label == name)
            .map(|idx| self.label_values[idx].as_str())
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }
}

/// Shared output of one scrape
///
/// Sending never blocks. If the consumer of the scrape has already gone away,
/// samples are dropped and the collector simply finishes its work.
#[derive(Debug, Clone)]
pub struct MetricSink {
    tx: UnboundedSender<Sample>,
}

impl MetricSink {
    /// Create a sink together with the receiving end of its stream
    pub fn channel() -> (Self, UnboundedReceiver<Sample>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, sample: Sample) {
        if self.tx.send(sample).is_err() {
            trace!("scrape consumer dropped, discarding sample");
        }
    }

    /// Build and send a gauge sample
    pub fn gauge(
        &self,
        desc: &Arc<MetricDesc>,
        value: f64,
        label_values: &[&str],
    ) -> Result<(), SampleError> {
        self.send(Sample::gauge(desc, value, label_values)?);
        Ok(())
    }

    /// Build and send a counter sample
    pub fn counter(
        &self,
        desc: &Arc<MetricDesc>,
        value: f64,
        label_values: &[&str],
    ) -> Result<(), SampleError> {
        self.send(Sample::counter(desc, value, label_values)?);
        Ok(())
    }
}
