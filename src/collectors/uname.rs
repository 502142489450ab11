//! Host identification, boot time and uptime

use std::sync::Arc;

use async_trait::async_trait;
use sysinfo::System;

use crate::collector::{Collector, CollectorError};
use crate::metric::{MetricDesc, MetricSink};

pub struct UnameCollector {
    info: Arc<MetricDesc>,
    boot_time: Arc<MetricDesc>,
    uptime: Arc<MetricDesc>,
}

impl UnameCollector {
    pub fn new(namespace: &str) -> Self {
        Self {
            info: Arc::new(MetricDesc::new(
                namespace,
                "uname",
                "info",
                "Labeled system information as provided by the operating system.",
                &["sysname", "release", "version", "nodename", "machine"],
            )),
            boot_time: Arc::new(MetricDesc::new(
                namespace,
                "",
                "boot_time_seconds",
                "Node boot time, in unixtime.",
                &[],
            )),
            uptime: Arc::new(MetricDesc::new(
                namespace,
                "",
                "uptime_seconds",
                "Seconds since boot.",
                &[],
            )),
        }
    }
}

#[async_trait]
impl Collector for UnameCollector {
    async fn update(&self, sink: &MetricSink) -> Result<(), CollectorError> {
        let sysname = System::name().unwrap_or_default();
        let release = System::kernel_version().unwrap_or_default();
        let version = System::os_version().unwrap_or_default();
        let nodename = System::host_name().unwrap_or_default();
        let machine = System::cpu_arch();

        sink.gauge(
            &self.info,
            1.0,
            &[
                sysname.as_str(),
                release.as_str(),
                version.as_str(),
                nodename.as_str(),
                machine.as_str(),
            ],
        )?;
        sink.gauge(&self.boot_time, System::boot_time() as f64, &[])?;
        sink.gauge(&self.uptime, System::uptime() as f64, &[])?;

        Ok(())
    }
}
