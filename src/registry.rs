//! Collector registry
//!
//! The registry maps a collector name to its enablement toggle and to the
//! function that builds it. Registration happens during startup; the first
//! orchestrator built from a registry seals it, after which every attempt to
//! register or toggle a collector is rejected.
//!
//! Registering the same name twice replaces the previous descriptor (last write
//! wins). The replacement is logged so accidental double registration is visible.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use regex::Regex;
use tracing::{Span, debug, warn};

use crate::collector::{AsyncCollector, Collector, CollectorInstance};
use crate::error::RegistryError;

static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("collector name pattern is valid")
});

type BuildFn<T> = Box<dyn Fn(&Span) -> anyhow::Result<T> + Send + Sync>;

/// How to build a collector, tagged with the capability set it will have
pub enum Factory {
    Sync(BuildFn<Arc<dyn Collector>>),
    Async(BuildFn<Arc<dyn AsyncCollector>>),
}

impl Factory {
    pub fn sync<F>(build: F) -> Self
    where
        F: Fn(&Span) -> anyhow::Result<Arc<dyn Collector>> + Send + Sync + 'static,
    {
        Factory::Sync(Box::new(build))
    }

    pub fn asynchronous<F>(build: F) -> Self
    where
        F: Fn(&Span) -> anyhow::Result<Arc<dyn AsyncCollector>> + Send + Sync + 'static,
    {
        Factory::Async(Box::new(build))
    }

    pub fn build(&self, span: &Span) -> anyhow::Result<CollectorInstance> {
        match self {
            Factory::Sync(build) => build(span).map(CollectorInstance::Sync),
            Factory::Async(build) => build(span).map(CollectorInstance::Async),
        }
    }

    pub fn is_async(&self) -> bool {
        matches!(self, Factory::Async(_))
    }
}

struct CollectorDescriptor {
    default_enabled: bool,
    enabled: bool,
    factory: Arc<Factory>,
}

/// Enablement state of one registered collector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorToggle {
    pub name: String,
    pub default_enabled: bool,
    pub enabled: bool,
    pub is_async: bool,
}

impl CollectorToggle {
    pub fn help(&self) -> String {
        let default_state = if self.default_enabled {
            "enabled"
        } else {
            "disabled"
        };
        format!(
            "Enable the {} collector (default: {default_state}).",
            self.name
        )
    }
}

#[derive(Default)]
pub struct Registry {
    descriptors: RwLock<BTreeMap<String, CollectorDescriptor>>,
    sealed: AtomicBool,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collector that produces metrics on demand
    pub fn register<C, F>(
        &self,
        name: &str,
        default_enabled: bool,
        constructor: F,
    ) -> Result<(), RegistryError>
    where
        C: Collector,
        F: Fn(&Span) -> anyhow::Result<C> + Send + Sync + 'static,
    {
        let factory = Factory::sync(move |span| {
            constructor(span).map(|collector| Arc::new(collector) as Arc<dyn Collector>)
        });
        self.insert(name, default_enabled, factory)
    }

    /// Register a collector that also runs a background loop
    ///
    /// Once constructed, the instance is picked up by the
    /// [`AsyncRunner`](crate::runner::AsyncRunner).
    pub fn register_async<C, F>(
        &self,
        name: &str,
        default_enabled: bool,
        constructor: F,
    ) -> Result<(), RegistryError>
    where
        C: AsyncCollector,
        F: Fn(&Span) -> anyhow::Result<C> + Send + Sync + 'static,
    {
        let factory = Factory::asynchronous(move |span| {
            constructor(span).map(|collector| Arc::new(collector) as Arc<dyn AsyncCollector>)
        });
        self.insert(name, default_enabled, factory)
    }

    fn insert(
        &self,
        name: &str,
        default_enabled: bool,
        factory: Factory,
    ) -> Result<(), RegistryError> {
        if !NAME_PATTERN.is_match(name) {
            return Err(RegistryError::InvalidName(name.to_string()));
        }

        let mut descriptors = self
            .descriptors
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if self.is_sealed() {
            return Err(RegistryError::Sealed(name.to_string()));
        }

        let descriptor = CollectorDescriptor {
            default_enabled,
            enabled: default_enabled,
            factory: Arc::new(factory),
        };

        if descriptors.insert(name.to_string(), descriptor).is_some() {
            warn!(collector = %name, "collector registered twice, replacing previous registration");
        } else {
            debug!(collector = %name, default_enabled, "registered collector");
        }

        Ok(())
    }

    /// Flip the enablement toggle of a registered collector
    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<(), RegistryError> {
        let mut descriptors = self
            .descriptors
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if self.is_sealed() {
            return Err(RegistryError::Sealed(name.to_string()));
        }

        let descriptor = descriptors
            .get_mut(name)
            .ok_or_else(|| RegistryError::UnknownCollector(name.to_string()))?;
        descriptor.enabled = enabled;

        Ok(())
    }

    /// Current enablement of `name`, or `None` if it was never registered
    pub fn is_enabled(&self, name: &str) -> Option<bool> {
        self.descriptors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map(|descriptor| descriptor.enabled)
    }

    /// All registered collectors, sorted by name
    pub fn toggles(&self) -> Vec<CollectorToggle> {
        self.descriptors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, descriptor)| CollectorToggle {
                name: name.clone(),
                default_enabled: descriptor.default_enabled,
                enabled: descriptor.enabled,
                is_async: descriptor.factory.is_async(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.descriptors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reject any further registration or toggling
    pub fn seal(&self) {
        let _guard = self
            .descriptors
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if !self.sealed.swap(true, Ordering::SeqCst) {
            debug!("collector registry sealed");
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::SeqCst)
    }

    /// Factories of all currently enabled collectors
    pub(crate) fn enabled_factories(&self) -> Vec<(String, Arc<Factory>)> {
        self.descriptors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, descriptor)| descriptor.enabled)
            .map(|(name, descriptor)| (name.clone(), Arc::clone(&descriptor.factory)))
            .collect()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("collectors", &self.len())
            .field("sealed", &self.is_sealed())
            .finish_non_exhaustive()
    }
}
