//! Process-wide cache of constructed collectors
//!
//! A collector is built at most once per cache, no matter how many orchestrators
//! are built from it. Collectors with internal state (rate counters, background
//! snapshots) rely on this. Construction runs under the cache lock, so two
//! orchestrators built concurrently still invoke each constructor at most once.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, debug_span};

use crate::collector::{AsyncCollector, CollectorInstance};
use crate::registry::Factory;

#[derive(Debug, Default)]
pub struct InstanceCache {
    instances: Mutex<BTreeMap<String, CollectorInstance>>,
}

impl InstanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached instance for `name`, building it with `factory` on first use
    ///
    /// A failed construction leaves no entry behind, so the next caller retries.
    pub fn get_or_build(&self, name: &str, factory: &Factory) -> anyhow::Result<CollectorInstance> {
        let mut instances = self
            .instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(instance) = instances.get(name) {
            return Ok(instance.clone());
        }

        debug!(collector = %name, "init collector");
        let span = debug_span!("collector", name = %name);
        let instance = factory.build(&span)?;
        instances.insert(name.to_string(), instance.clone());

        Ok(instance)
    }

    pub fn get(&self, name: &str) -> Option<CollectorInstance> {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Every constructed collector with a background loop, sorted by name
    pub fn async_collectors(&self) -> Vec<(String, Arc<dyn AsyncCollector>)> {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|(name, instance)| {
                instance
                    .as_async()
                    .map(|collector| (name.clone(), Arc::clone(collector)))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
