//! Test collectors shared by the integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use guardia_exporter::{
    AsyncCollector, Collector, CollectorError, MetricDesc, MetricSink, Registry,
};
use tokio_util::sync::CancellationToken;

/// Emits one gauge named `test_<name>` after an optional delay
pub struct Delayed {
    desc: Arc<MetricDesc>,
    delay: Duration,
}

impl Delayed {
    pub fn new(name: &str, delay: Duration) -> Self {
        Self {
            desc: Arc::new(MetricDesc::new("test", "", name, "A delayed value.", &[])),
            delay,
        }
    }
}

#[async_trait]
impl Collector for Delayed {
    async fn update(&self, sink: &MetricSink) -> Result<(), CollectorError> {
        tokio::time::sleep(self.delay).await;
        sink.gauge(&self.desc, 1.0, &[])?;
        Ok(())
    }
}

pub struct Failing;

#[async_trait]
impl Collector for Failing {
    async fn update(&self, _sink: &MetricSink) -> Result<(), CollectorError> {
        Err(anyhow::anyhow!("backend unreachable").into())
    }
}

pub struct Empty;

#[async_trait]
impl Collector for Empty {
    async fn update(&self, _sink: &MetricSink) -> Result<(), CollectorError> {
        Err(CollectorError::NoData)
    }
}

/// Background loop counting its iterations until the lifetime ends
pub struct Ticker {
    pub ticks: Arc<AtomicUsize>,
    pub stopped: Arc<AtomicUsize>,
}

impl Ticker {
    pub fn new() -> Self {
        Self {
            ticks: Arc::new(AtomicUsize::new(0)),
            stopped: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Collector for Ticker {
    async fn update(&self, _sink: &MetricSink) -> Result<(), CollectorError> {
        if self.ticks.load(Ordering::SeqCst) == 0 {
            return Err(CollectorError::NoData);
        }
        Ok(())
    }
}

#[async_trait]
impl AsyncCollector for Ticker {
    async fn run_background(&self, lifetime: CancellationToken) -> Result<(), CollectorError> {
        let mut interval = tokio::time::interval(Duration::from_millis(5));
        loop {
            tokio::select! {
                _ = lifetime.cancelled() => break,
                _ = interval.tick() => {
                    self.ticks.fetch_add(1, Ordering::SeqCst);
                }
            }
        }
        self.stopped.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Register `count` delayed collectors named `c0`, `c1`, ...
pub fn delayed_registry(count: usize, delay: Duration) -> Registry {
    let registry = Registry::new();
    for i in 0..count {
        let name = format!("c{i}");
        let metric = name.clone();
        registry
            .register(&name, true, move |_| Ok(Delayed::new(&metric, delay)))
            .unwrap();
    }
    registry
}

/// Register a collector whose constructor bumps `calls`
pub fn register_counted(registry: &Registry, name: &str, calls: Arc<AtomicUsize>) {
    let metric = name.to_string();
    registry
        .register(name, true, move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Delayed::new(&metric, Duration::ZERO))
        })
        .unwrap();
}
