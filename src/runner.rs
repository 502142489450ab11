//! Background runner for async collectors
//!
//! Every constructed [`AsyncCollector`] gets exactly one task running its
//! background loop. All tasks share one [`CancellationToken`]: cancelling it is
//! the only way the runner asks them to stop, and each loop has to observe it.
//!
//! The runner waits for every task to return and then reports the first error
//! it saw. An erroring task does not cancel the lifetime, so its siblings keep
//! collecting until the lifetime itself ends.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument};

use crate::cache::InstanceCache;
use crate::collector::AsyncCollector;
use crate::error::RunnerError;

pub struct AsyncRunner {
    collectors: Vec<(String, Arc<dyn AsyncCollector>)>,
}

impl AsyncRunner {
    /// Snapshot every async collector constructed into `cache` so far
    pub fn new(cache: &InstanceCache) -> Self {
        Self {
            collectors: cache.async_collectors(),
        }
    }

    pub fn collectors(&self) -> Vec<&str> {
        self.collectors
            .iter()
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    /// Run all background loops until each of them has returned
    #[instrument(skip_all, fields(collectors = self.collectors.len()))]
    pub async fn run(self, lifetime: CancellationToken) -> Result<(), RunnerError> {
        let mut tasks = JoinSet::new();

        for (name, collector) in self.collectors {
            debug!(collector = %name, "async collector running in background");

            let lifetime = lifetime.clone();
            tasks.spawn(async move {
                let result = AssertUnwindSafe(collector.run_background(lifetime))
                    .catch_unwind()
                    .await;
                (name, result)
            });
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let failure = match joined {
                Ok((name, Ok(Ok(())))) => {
                    debug!(collector = %name, "async collector stopped");
                    None
                }
                Ok((name, Ok(Err(source)))) if source.is_no_data() => {
                    debug!(collector = %name, "async collector stopped without data");
                    None
                }
                Ok((name, Ok(Err(source)))) => {
                    error!(collector = %name, error = %source, "async collector failed");
                    Some(RunnerError::Collector { name, source })
                }
                Ok((name, Err(_))) => {
                    error!(collector = %name, "async collector panicked");
                    Some(RunnerError::Panicked { name })
                }
                Err(e) => {
                    error!(error = %e, "async collector task did not complete");
                    None
                }
            };
            first_error = first_error.or(failure);
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for AsyncRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncRunner")
            .field("collectors", &self.collectors())
            .finish()
    }
}
