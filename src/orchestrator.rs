//! Scrape orchestrator
//!
//! An [`Orchestrator`] owns the active working set of collectors for one exporter
//! lifetime. It is built once from a sealed [`Registry`] and an [`InstanceCache`],
//! and is immutable afterwards, so any number of scrapes may run against it at
//! the same time.
//!
//! ## Scrape flow
//!
//! ```text
//! collect() ──spawn──▶ task(cpu)    ── update ── samples ── duration ── success ─┐
//!           ──spawn──▶ task(memory) ── update ── samples ── duration ── success ─┤
//!           ──spawn──▶ task(...)    ── ...                                       ─┤
//!                                                                                 ▼
//!                                                              MetricSink (mpsc) ──▶ Scrape stream
//! ```
//!
//! The stream ends once every task has finished. A failing (or panicking)
//! collector only turns its own success sample to 0; the scrape always completes.

use std::collections::{BTreeMap, BTreeSet};
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures::{FutureExt, Stream};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinSet;
use tracing::{Level, debug, error, info, instrument, warn};

use crate::cache::InstanceCache;
use crate::collector::CollectorInstance;
use crate::error::BuildError;
use crate::metric::{MetricDesc, MetricSink, Sample, is_valid_namespace};
use crate::registry::Registry;

/// Subsystem of the two bookkeeping metrics
pub const SCRAPE_SUBSYSTEM: &str = "scrape";

/// Label carrying the collector name on bookkeeping metrics
pub const COLLECTOR_LABEL: &str = "collector";

/// How a single collector fared during one scrape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeStatus {
    Success,
    /// The collector had nothing to report. Logged at debug level, not an error.
    NoData,
    Failed,
}

impl ScrapeStatus {
    /// Severity this outcome is logged with
    pub fn level(&self) -> Level {
        match self {
            ScrapeStatus::Success | ScrapeStatus::NoData => Level::DEBUG,
            ScrapeStatus::Failed => Level::ERROR,
        }
    }

    /// Value of the success bookkeeping sample
    pub fn success_value(&self) -> f64 {
        match self {
            ScrapeStatus::Success => 1.0,
            ScrapeStatus::NoData | ScrapeStatus::Failed => 0.0,
        }
    }
}

/// Per-collector record of one scrape
#[derive(Debug, Clone)]
pub struct ScrapeOutcome {
    pub name: String,
    pub duration: Duration,
    pub status: ScrapeStatus,
    pub error: Option<String>,
}

/// Everything one scrape produced
#[derive(Debug, Clone, Default)]
pub struct ScrapeReport {
    pub samples: Vec<Sample>,
    /// Sorted by collector name
    pub outcomes: Vec<ScrapeOutcome>,
}

impl ScrapeReport {
    pub fn outcome(&self, name: &str) -> Option<&ScrapeOutcome> {
        self.outcomes.iter().find(|outcome| outcome.name == name)
    }

    /// Samples of one metric family
    pub fn samples_named<'a>(&'a self, fq_name: &'a str) -> impl Iterator<Item = &'a Sample> + 'a {
        self.samples
            .iter()
            .filter(move |sample| sample.fq_name() == fq_name)
    }
}

#[derive(Debug)]
struct Bookkeeping {
    duration: Arc<MetricDesc>,
    success: Arc<MetricDesc>,
}

#[derive(Debug, Clone)]
pub struct Orchestrator {
    collectors: Arc<BTreeMap<String, CollectorInstance>>,
    bookkeeping: Arc<Bookkeeping>,
}

impl Orchestrator {
    /// Build the active working set
    ///
    /// Seals `registry`. `namespace` must be a valid metric name prefix or
    /// empty. A non-empty `filter` restricts the working set to the
    /// named collectors; every one of them must exist and be enabled. Collectors
    /// are taken from `cache` or constructed into it on first use.
    #[instrument(skip(registry, cache, filter))]
    pub fn new<S: AsRef<str>>(
        registry: &Registry,
        cache: &InstanceCache,
        namespace: &str,
        filter: &[S],
    ) -> Result<Self, BuildError> {
        registry.seal();

        if !is_valid_namespace(namespace) {
            return Err(BuildError::InvalidNamespace(namespace.to_string()));
        }

        let mut wanted = BTreeSet::new();
        for name in filter {
            let name = name.as_ref();
            match registry.is_enabled(name) {
                None => return Err(BuildError::UnknownCollector(name.to_string())),
                Some(false) => return Err(BuildError::DisabledCollector(name.to_string())),
                Some(true) => {
                    wanted.insert(name.to_string());
                }
            }
        }

        let mut collectors = BTreeMap::new();
        for (name, factory) in registry.enabled_factories() {
            if !wanted.is_empty() && !wanted.contains(&name) {
                continue;
            }

            let instance = cache
                .get_or_build(&name, &factory)
                .map_err(|source| BuildError::Constructor {
                    name: name.clone(),
                    source,
                })?;
            collectors.insert(name, instance);
        }

        debug!(collectors = ?collectors.keys().collect::<Vec<_>>(), "orchestrator ready");

        Ok(Self {
            collectors: Arc::new(collectors),
            bookkeeping: Arc::new(Bookkeeping {
                duration: Arc::new(MetricDesc::new(
                    namespace,
                    SCRAPE_SUBSYSTEM,
                    "collector_duration_seconds",
                    "Duration of a collector scrape.",
                    &[COLLECTOR_LABEL],
                )),
                success: Arc::new(MetricDesc::new(
                    namespace,
                    SCRAPE_SUBSYSTEM,
                    "collector_success",
                    "Whether a collector succeeded.",
                    &[COLLECTOR_LABEL],
                )),
            }),
        })
    }

    /// Names of the active collectors, sorted
    pub fn collectors(&self) -> Vec<&str> {
        self.collectors.keys().map(String::as_str).collect()
    }

    /// Descriptors of the bookkeeping metrics
    pub fn describe(&self) -> Vec<Arc<MetricDesc>> {
        vec![
            Arc::clone(&self.bookkeeping.duration),
            Arc::clone(&self.bookkeeping.success),
        ]
    }

    /// Start a scrape of every active collector
    ///
    /// Must be called within a Tokio runtime. All collectors run concurrently;
    /// the returned stream yields their samples as they arrive and ends when the
    /// last collector is done.
    pub fn collect(&self) -> Scrape {
        let (sink, samples) = MetricSink::channel();
        let mut tasks = JoinSet::new();

        for (name, collector) in self.collectors.iter() {
            let name = name.clone();
            let collector = collector.clone();
            let sink = sink.clone();
            let bookkeeping = Arc::clone(&self.bookkeeping);

            tasks.spawn(async move { execute(name, &collector, &sink, &bookkeeping).await });
        }

        Scrape { samples, tasks }
    }

    /// Run a full scrape and wait for it
    pub async fn scrape(&self) -> ScrapeReport {
        self.collect().finish().await
    }
}

async fn execute(
    name: String,
    collector: &CollectorInstance,
    sink: &MetricSink,
    bookkeeping: &Bookkeeping,
) -> ScrapeOutcome {
    let begin = Instant::now();
    let result = AssertUnwindSafe(collector.update(sink)).catch_unwind().await;
    let duration = begin.elapsed();
    let duration_seconds = duration.as_secs_f64();

    let (status, error) = match result {
        Ok(Ok(())) => (ScrapeStatus::Success, None),
        Ok(Err(err)) if err.is_no_data() => (ScrapeStatus::NoData, Some(err.to_string())),
        Ok(Err(err)) => (ScrapeStatus::Failed, Some(err.to_string())),
        Err(_) => (ScrapeStatus::Failed, Some("collector panicked".to_string())),
    };
    log_outcome(&name, duration_seconds, status, error.as_deref());

    let bookkeeping_samples = [
        Sample::gauge(&bookkeeping.duration, duration_seconds, &[name.as_str()]),
        Sample::gauge(&bookkeeping.success, status.success_value(), &[name.as_str()]),
    ];
    for sample in bookkeeping_samples {
        match sample {
            Ok(sample) => sink.send(sample),
            Err(e) => error!(collector = %name, error = %e, "failed to build bookkeeping sample"),
        }
    }

    ScrapeOutcome {
        name,
        duration,
        status,
        error,
    }
}

fn log_outcome(name: &str, duration_seconds: f64, status: ScrapeStatus, error: Option<&str>) {
    let message = match status {
        ScrapeStatus::Success => "collector succeeded",
        ScrapeStatus::NoData => "collector returned no data",
        ScrapeStatus::Failed => "collector failed",
    };

    match status.level() {
        Level::ERROR => error!(collector = %name, duration_seconds, error, "{message}"),
        Level::WARN => warn!(collector = %name, duration_seconds, error, "{message}"),
        Level::INFO => info!(collector = %name, duration_seconds, error, "{message}"),
        _ => debug!(collector = %name, duration_seconds, error, "{message}"),
    }
}

/// A running scrape
///
/// Yields samples in arrival order. Not restartable: once the stream ended, the
/// scrape is over. Dropping it aborts collectors that are still running.
pub struct Scrape {
    samples: UnboundedReceiver<Sample>,
    tasks: JoinSet<ScrapeOutcome>,
}

impl Scrape {
    /// Drain all samples and wait for every collector to report its outcome
    pub async fn finish(mut self) -> ScrapeReport {
        let mut samples = vec![];
        while let Some(sample) = self.samples.recv().await {
            samples.push(sample);
        }

        let mut outcomes = vec![];
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!(error = %e, "scrape task did not complete"),
            }
        }
        outcomes.sort_by(|a, b| a.name.cmp(&b.name));

        ScrapeReport { samples, outcomes }
    }
}

impl Stream for Scrape {
    type Item = Sample;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.samples.poll_recv(cx)
    }
}
