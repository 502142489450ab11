//! Mounted filesystem sizes
//!
//! Disabled by default: listing mounts may block for a long time on
//! unresponsive network filesystems, so the listing runs on the blocking pool.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use sysinfo::Disks;

use crate::collector::{Collector, CollectorError};
use crate::metric::{MetricDesc, MetricSink};

struct DiskReading {
    device: String,
    mount_point: String,
    fs_type: String,
    total: u64,
    available: u64,
}

pub struct FilesystemCollector {
    size: Arc<MetricDesc>,
    available: Arc<MetricDesc>,
}

impl FilesystemCollector {
    pub fn new(namespace: &str) -> Self {
        const LABELS: &[&str] = &["device", "mountpoint", "fstype"];

        Self {
            size: Arc::new(MetricDesc::new(
                namespace,
                "filesystem",
                "size_bytes",
                "Filesystem size in bytes.",
                LABELS,
            )),
            available: Arc::new(MetricDesc::new(
                namespace,
                "filesystem",
                "avail_bytes",
                "Filesystem space available to non-root users in bytes.",
                LABELS,
            )),
        }
    }
}

fn read_disks() -> Vec<DiskReading> {
    Disks::new_with_refreshed_list()
        .list()
        .iter()
        .map(|disk| DiskReading {
            device: disk.name().to_string_lossy().into_owned(),
            mount_point: disk.mount_point().display().to_string(),
            fs_type: disk.file_system().to_string_lossy().into_owned(),
            total: disk.total_space(),
            available: disk.available_space(),
        })
        .collect()
}

#[async_trait]
impl Collector for FilesystemCollector {
    async fn update(&self, sink: &MetricSink) -> Result<(), CollectorError> {
        let disks = tokio::task::spawn_blocking(read_disks)
            .await
            .context("filesystem listing did not complete")?;

        if disks.is_empty() {
            return Err(CollectorError::NoData);
        }

        for disk in &disks {
            let labels = [
                disk.device.as_str(),
                disk.mount_point.as_str(),
                disk.fs_type.as_str(),
            ];
            sink.gauge(&self.size, disk.total as f64, &labels)?;
            sink.gauge(&self.available, disk.available as f64, &labels)?;
        }

        Ok(())
    }
}
