//! Memory and swap usage

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use sysinfo::System;

use crate::collector::{Collector, CollectorError};
use crate::metric::{MetricDesc, MetricSink};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct MemoryInformation {
    total: u64,
    used: u64,
    available: u64,
    total_swap: u64,
    used_swap: u64,
}

pub struct MemoryCollector {
    system: Mutex<System>,
    total: Arc<MetricDesc>,
    used: Arc<MetricDesc>,
    available: Arc<MetricDesc>,
    swap_total: Arc<MetricDesc>,
    swap_used: Arc<MetricDesc>,
}

impl MemoryCollector {
    pub fn new(namespace: &str) -> Self {
        let desc = |name: &str, help: &str| Arc::new(MetricDesc::new(namespace, "memory", name, help, &[]));

        Self {
            system: Mutex::new(System::new()),
            total: desc("total_bytes", "Total physical memory."),
            used: desc("used_bytes", "Used physical memory."),
            available: desc("available_bytes", "Memory available for new allocations."),
            swap_total: desc("swap_total_bytes", "Total swap space."),
            swap_used: desc("swap_used_bytes", "Used swap space."),
        }
    }

    fn read(&self) -> MemoryInformation {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_memory();

        MemoryInformation {
            total: system.total_memory(),
            used: system.used_memory(),
            available: system.available_memory(),
            total_swap: system.total_swap(),
            used_swap: system.used_swap(),
        }
    }
}

#[async_trait]
impl Collector for MemoryCollector {
    async fn update(&self, sink: &MetricSink) -> Result<(), CollectorError> {
        let memory = self.read();
        if memory.total == 0 {
            return Err(CollectorError::NoData);
        }

        sink.gauge(&self.total, memory.total as f64, &[])?;
        sink.gauge(&self.used, memory.used as f64, &[])?;
        sink.gauge(&self.available, memory.available as f64, &[])?;
        sink.gauge(&self.swap_total, memory.total_swap as f64, &[])?;
        sink.gauge(&self.swap_used, memory.used_swap as f64, &[])?;

        Ok(())
    }
}
