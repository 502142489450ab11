//! Prometheus text exposition of finished scrapes
//!
//! Samples are grouped into metric families by their fully qualified name and
//! loaded into a throwaway [`prometheus::Registry`], which is then rendered with
//! the [`TextEncoder`]. A family or sample that cannot be represented (clashing
//! label sets, repeated label values, negative counters) is logged and skipped;
//! the rest of the scrape is still exposed.

use std::collections::{BTreeMap, HashSet};

use anyhow::Context;
use prometheus::{CounterVec, GaugeVec, Opts, TextEncoder};
use tracing::{trace, warn};

use crate::metric::{MetricDesc, Sample, ValueType};

/// Content type of [`encode`]'s output
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

enum FamilyVec {
    Gauge(GaugeVec),
    Counter(CounterVec),
}

impl FamilyVec {
    fn new(desc: &MetricDesc, value_type: ValueType) -> prometheus::Result<Self> {
        let help = if desc.help().is_empty() {
            desc.fq_name()
        } else {
            desc.help()
        };
        let opts = Opts::new(desc.fq_name(), help);
        let labels: Vec<&str> = desc.labels().iter().map(String::as_str).collect();

        Ok(match value_type {
            ValueType::Gauge => FamilyVec::Gauge(GaugeVec::new(opts, labels.as_slice())?),
            ValueType::Counter => FamilyVec::Counter(CounterVec::new(opts, labels.as_slice())?),
        })
    }

    fn register(&self, registry: &prometheus::Registry) -> prometheus::Result<()> {
        match self {
            FamilyVec::Gauge(vec) => registry.register(Box::new(vec.clone())),
            FamilyVec::Counter(vec) => registry.register(Box::new(vec.clone())),
        }
    }

    fn set(&self, sample: &Sample) -> anyhow::Result<()> {
        let values: Vec<&str> = sample.label_values().iter().map(String::as_str).collect();

        match self {
            FamilyVec::Gauge(vec) => vec
                .get_metric_with_label_values(values.as_slice())?
                .set(sample.value()),
            FamilyVec::Counter(vec) => {
                if !(sample.value() >= 0.0) {
                    anyhow::bail!("counter value {} is not a non-negative number", sample.value());
                }
                vec.get_metric_with_label_values(values.as_slice())?
                    .inc_by(sample.value());
            }
        }

        Ok(())
    }
}

/// Render samples in the Prometheus text format
pub fn encode(samples: &[Sample]) -> anyhow::Result<String> {
    let mut families: BTreeMap<&str, Vec<&Sample>> = BTreeMap::new();
    for sample in samples {
        families.entry(sample.fq_name()).or_default().push(sample);
    }

    let registry = prometheus::Registry::new();
    for (name, family) in families {
        let first = family[0];

        let vec = match FamilyVec::new(first.desc(), first.value_type())
            .and_then(|vec| vec.register(&registry).map(|_| vec))
        {
            Ok(vec) => vec,
            Err(e) => {
                warn!(metric = %name, error = %e, "skipping metric family");
                continue;
            }
        };

        let mut seen = HashSet::new();
        for sample in family {
            if sample.desc().labels() != first.desc().labels() {
                warn!(metric = %name, "inconsistent label names, skipping sample");
                continue;
            }
            if !seen.insert(sample.label_values()) {
                warn!(metric = %name, labels = ?sample.label_values(), "duplicate sample, skipping");
                continue;
            }
            if let Err(e) = vec.set(sample) {
                warn!(metric = %name, error = %e, "skipping sample");
            }
        }
    }

    let gathered = registry.gather();
    trace!(families = gathered.len(), "encoding scrape");

    let mut buffer = String::new();
    TextEncoder::new()
        .encode_utf8(&gathered, &mut buffer)
        .context("failed to encode metrics")?;

    Ok(buffer)
}
