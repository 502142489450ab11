//! CPU usage, pre-warmed in the background
//!
//! `sysinfo` needs two refreshes some time apart to compute CPU usage. Doing
//! both inside a scrape would stall it, so the background loop keeps
//! refreshing and `update` only reads the latest snapshot.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use sysinfo::{MINIMUM_CPU_UPDATE_INTERVAL, System};
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::collector::{AsyncCollector, Collector, CollectorError};
use crate::metric::{MetricDesc, MetricSink};

#[derive(Debug, Clone, PartialEq)]
struct CpuReading {
    name: String,
    usage: f32,
    frequency_mhz: u64,
}

pub struct CpuCollector {
    system: Mutex<System>,
    snapshot: RwLock<Option<Vec<CpuReading>>>,
    interval: Duration,
    usage: Arc<MetricDesc>,
    frequency: Arc<MetricDesc>,
}

impl CpuCollector {
    /// `interval` is raised to `sysinfo`'s minimum update interval if shorter
    pub fn new(namespace: &str, interval: Duration) -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();

        Self {
            system: Mutex::new(system),
            snapshot: RwLock::new(None),
            interval: interval.max(MINIMUM_CPU_UPDATE_INTERVAL),
            usage: Arc::new(MetricDesc::new(
                namespace,
                "cpu",
                "usage_ratio",
                "CPU usage between 0 and 1, averaged over the last refresh interval.",
                &["cpu"],
            )),
            frequency: Arc::new(MetricDesc::new(
                namespace,
                "cpu",
                "frequency_hertz",
                "Current CPU frequency.",
                &["cpu"],
            )),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether at least one background refresh has completed
    pub fn is_warm(&self) -> bool {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn refresh(&self) {
        let readings: Vec<_> = {
            let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
            system.refresh_cpu_all();
            system
                .cpus()
                .iter()
                .map(|cpu| CpuReading {
                    name: cpu.name().to_string(),
                    usage: cpu.cpu_usage(),
                    frequency_mhz: cpu.frequency(),
                })
                .collect()
        };

        trace!(cpus = readings.len(), "refreshed cpu snapshot");
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Some(readings);
    }
}

#[async_trait]
impl Collector for CpuCollector {
    async fn update(&self, sink: &MetricSink) -> Result<(), CollectorError> {
        let snapshot = self
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(readings) = snapshot else {
            return Err(CollectorError::NoData);
        };

        for reading in &readings {
            sink.gauge(
                &self.usage,
                f64::from(reading.usage) / 100.0,
                &[reading.name.as_str()],
            )?;
            sink.gauge(
                &self.frequency,
                reading.frequency_mhz as f64 * 1_000_000.0,
                &[reading.name.as_str()],
            )?;
        }

        Ok(())
    }
}

#[async_trait]
impl AsyncCollector for CpuCollector {
    async fn run_background(&self, lifetime: CancellationToken) -> Result<(), CollectorError> {
        debug!(interval = ?self.interval, "starting cpu refresh loop");

        // the first refresh happened in `new`, so wait a full interval before measuring
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);

        loop {
            tokio::select! {
                _ = lifetime.cancelled() => break,
                _ = ticker.tick() => self.refresh(),
            }
        }

        debug!("cpu refresh loop stopped");
        Ok(())
    }
}
