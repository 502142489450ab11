//! System load averages

use std::sync::Arc;

use async_trait::async_trait;
use sysinfo::System;

use crate::collector::{Collector, CollectorError};
use crate::metric::{MetricDesc, MetricSink};

pub struct LoadavgCollector {
    load1: Arc<MetricDesc>,
    load5: Arc<MetricDesc>,
    load15: Arc<MetricDesc>,
}

impl LoadavgCollector {
    pub fn new(namespace: &str) -> Self {
        let desc = |name: &str, help: &str| Arc::new(MetricDesc::new(namespace, "", name, help, &[]));

        Self {
            load1: desc("load1", "1m load average."),
            load5: desc("load5", "5m load average."),
            load15: desc("load15", "15m load average."),
        }
    }
}

#[async_trait]
impl Collector for LoadavgCollector {
    async fn update(&self, sink: &MetricSink) -> Result<(), CollectorError> {
        let load = System::load_average();

        sink.gauge(&self.load1, load.one, &[])?;
        sink.gauge(&self.load5, load.five, &[])?;
        sink.gauge(&self.load15, load.fifteen, &[])?;

        Ok(())
    }
}
