//! Collector capabilities
//!
//! Every data source implements [`Collector`]. Sources that keep their state warm
//! in the background additionally implement [`AsyncCollector`]. The registry keeps
//! track of which of the two a constructed instance is via [`CollectorInstance`],
//! so neither the orchestrator nor the async runner ever has to inspect types at
//! runtime.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::metric::{MetricSink, SampleError};

/// Errors a collector may report from `update` or `run_background`
#[derive(Debug, Error)]
pub enum CollectorError {
    /// Nothing to report this time. Not an error condition.
    #[error("collector returned no data")]
    NoData,

    #[error(transparent)]
    Failure(#[from] anyhow::Error),
}

impl CollectorError {
    pub fn is_no_data(&self) -> bool {
        matches!(self, CollectorError::NoData)
    }
}

impl From<SampleError> for CollectorError {
    fn from(err: SampleError) -> Self {
        CollectorError::Failure(err.into())
    }
}

/// A source producing metrics on demand
#[async_trait]
pub trait Collector: Send + Sync + 'static {
    /// Produce this collector's samples for one scrape
    ///
    /// May be called concurrently with other collectors' `update` on clones of the
    /// same sink, and concurrently with itself when scrapes overlap.
    async fn update(&self, sink: &MetricSink) -> Result<(), CollectorError>;
}

/// A collector which keeps its state up to date in the background
#[async_trait]
pub trait AsyncCollector: Collector {
    /// Run until `lifetime` is cancelled or an unrecoverable error occurs
    ///
    /// Implementations must observe `lifetime` themselves; nothing preempts them.
    async fn run_background(&self, lifetime: CancellationToken) -> Result<(), CollectorError>;
}

/// A constructed collector, tagged with its capability set
#[derive(Clone)]
pub enum CollectorInstance {
    Sync(Arc<dyn Collector>),
    Async(Arc<dyn AsyncCollector>),
}

impl CollectorInstance {
    pub async fn update(&self, sink: &MetricSink) -> Result<(), CollectorError> {
        match self {
            CollectorInstance::Sync(collector) => collector.update(sink).await,
            CollectorInstance::Async(collector) => collector.update(sink).await,
        }
    }

    pub fn as_async(&self) -> Option<&Arc<dyn AsyncCollector>> {
        match self {
            CollectorInstance::Sync(_) => None,
            CollectorInstance::Async(collector) => Some(collector),
        }
    }

    pub fn is_async(&self) -> bool {
        self.as_async().is_some()
    }
}

impl std::fmt::Debug for CollectorInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectorInstance::Sync(_) => f.write_str("CollectorInstance::Sync"),
            CollectorInstance::Async(_) => f.write_str("CollectorInstance::Async"),
        }
    }
}
