//! Scrape-time metrics aggregation
//!
//! Collectors register with a [`Registry`] during startup. An [`Orchestrator`]
//! built from it fans a scrape out to every enabled collector and merges their
//! samples with two bookkeeping metrics per collector. Collectors with a
//! background loop are driven by the [`AsyncRunner`].
//!
//! ```text
//! Registry ──seal──▶ Orchestrator ──collect()──▶ Scrape (stream of samples)
//!     │                   │
//!     └── factories ──▶ InstanceCache ──▶ AsyncRunner (background loops)
//! ```

pub mod cache;
pub mod cli;
pub mod collector;
pub mod collectors;
pub mod config;
pub mod error;
#[cfg(feature = "server")]
pub mod exporter;
pub mod exposition;
pub mod metric;
pub mod orchestrator;
pub mod registry;
pub mod runner;
#[cfg(feature = "server")]
pub mod server;
pub mod util;

pub use cache::InstanceCache;
pub use collector::{AsyncCollector, Collector, CollectorError, CollectorInstance};
pub use error::{BuildError, RegistryError, RunnerError};
#[cfg(feature = "server")]
pub use exporter::Exporter;
pub use metric::{MetricDesc, MetricSink, Sample, ValueType};
pub use orchestrator::{Orchestrator, Scrape, ScrapeOutcome, ScrapeReport, ScrapeStatus};
pub use registry::Registry;
pub use runner::AsyncRunner;
