//! Network interface traffic counters

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use sysinfo::Networks;

use crate::collector::{Collector, CollectorError};
use crate::metric::{MetricDesc, MetricSink};

struct InterfaceReading {
    device: String,
    received_bytes: u64,
    transmitted_bytes: u64,
    received_packets: u64,
    transmitted_packets: u64,
}

pub struct NetdevCollector {
    receive_bytes: Arc<MetricDesc>,
    transmit_bytes: Arc<MetricDesc>,
    receive_packets: Arc<MetricDesc>,
    transmit_packets: Arc<MetricDesc>,
}

impl NetdevCollector {
    pub fn new(namespace: &str) -> Self {
        let desc = |name: &str, help: &str| {
            Arc::new(MetricDesc::new(namespace, "network", name, help, &["device"]))
        };

        Self {
            receive_bytes: desc("receive_bytes_total", "Network device statistic receive_bytes."),
            transmit_bytes: desc("transmit_bytes_total", "Network device statistic transmit_bytes."),
            receive_packets: desc(
                "receive_packets_total",
                "Network device statistic receive_packets.",
            ),
            transmit_packets: desc(
                "transmit_packets_total",
                "Network device statistic transmit_packets.",
            ),
        }
    }
}

fn read_interfaces() -> Vec<InterfaceReading> {
    Networks::new_with_refreshed_list()
        .list()
        .iter()
        .map(|(device, data)| InterfaceReading {
            device: device.clone(),
            received_bytes: data.total_received(),
            transmitted_bytes: data.total_transmitted(),
            received_packets: data.total_packets_received(),
            transmitted_packets: data.total_packets_transmitted(),
        })
        .collect()
}

#[async_trait]
impl Collector for NetdevCollector {
    async fn update(&self, sink: &MetricSink) -> Result<(), CollectorError> {
        let interfaces = tokio::task::spawn_blocking(read_interfaces)
            .await
            .context("network interface listing did not complete")?;

        if interfaces.is_empty() {
            return Err(CollectorError::NoData);
        }

        for interface in &interfaces {
            let labels = [interface.device.as_str()];
            sink.counter(&self.receive_bytes, interface.received_bytes as f64, &labels)?;
            sink.counter(&self.transmit_bytes, interface.transmitted_bytes as f64, &labels)?;
            sink.counter(&self.receive_packets, interface.received_packets as f64, &labels)?;
            sink.counter(
                &self.transmit_packets,
                interface.transmitted_packets as f64,
                &labels,
            )?;
        }

        Ok(())
    }
}
