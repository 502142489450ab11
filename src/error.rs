//! Error types for registration, orchestrator construction and the async runner

use thiserror::Error;

use crate::collector::CollectorError;

/// Errors raised while registering or toggling collectors
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The registry was sealed by the first orchestrator construction
    #[error("registry is sealed, cannot change collector {0}")]
    Sealed(String),

    #[error("invalid collector name: {0:?}")]
    InvalidName(String),

    #[error("unknown collector: {0}")]
    UnknownCollector(String),
}

/// Errors raised while building an orchestrator
///
/// All of them are fatal: no partially built orchestrator is ever returned.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The filter names a collector that was never registered
    #[error("missing collector: {0}")]
    UnknownCollector(String),

    /// The filter names a collector that is registered but disabled
    #[error("disabled collector: {0}")]
    DisabledCollector(String),

    /// The namespace cannot prefix a metric name
    #[error("invalid metric namespace: {0:?}")]
    InvalidNamespace(String),

    /// A collector's constructor failed
    #[error("failed to construct collector {name}: {source}")]
    Constructor {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Errors returned by [`AsyncRunner::run`](crate::runner::AsyncRunner::run)
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("async collector {name} failed: {source}")]
    Collector {
        name: String,
        #[source]
        source: CollectorError,
    },

    #[error("async collector {name} panicked")]
    Panicked { name: String },
}

impl RunnerError {
    pub fn collector_name(&self) -> &str {
        match self {
            RunnerError::Collector { name, .. } | RunnerError::Panicked { name } => name,
        }
    }
}
