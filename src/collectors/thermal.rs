//! Hardware temperature sensors
//!
//! Many virtual machines and containers expose no sensors at all. In that case
//! the collector reports no data rather than failing.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use sysinfo::Components;
use tracing::{Span, debug};

use crate::collector::{Collector, CollectorError};
use crate::metric::{MetricDesc, MetricSink};

struct SensorReading {
    label: String,
    temperature: f32,
    critical: Option<f32>,
}

fn read_sensors() -> Vec<SensorReading> {
    Components::new_with_refreshed_list()
        .iter()
        .filter_map(|component| {
            Some(SensorReading {
                label: component.label().to_string(),
                temperature: component.temperature()?,
                critical: component.critical(),
            })
        })
        .collect()
}

pub struct ThermalCollector {
    temperature: Arc<MetricDesc>,
    critical: Arc<MetricDesc>,
}

impl ThermalCollector {
    pub fn new(namespace: &str, span: &Span) -> Self {
        span.in_scope(|| {
            let components = Components::new_with_refreshed_list();
            debug!(sensors = components.len(), "discovered temperature sensors");
        });

        Self {
            temperature: Arc::new(MetricDesc::new(
                namespace,
                "hwmon",
                "temp_celsius",
                "Hardware monitor for temperature.",
                &["sensor"],
            )),
            critical: Arc::new(MetricDesc::new(
                namespace,
                "hwmon",
                "temp_crit_celsius",
                "Hardware monitor critical temperature.",
                &["sensor"],
            )),
        }
    }
}

#[async_trait]
impl Collector for ThermalCollector {
    async fn update(&self, sink: &MetricSink) -> Result<(), CollectorError> {
        let sensors = tokio::task::spawn_blocking(read_sensors)
            .await
            .context("sensor listing did not complete")?;

        if sensors.is_empty() {
            return Err(CollectorError::NoData);
        }

        for sensor in &sensors {
            let labels = [sensor.label.as_str()];
            sink.gauge(&self.temperature, f64::from(sensor.temperature), &labels)?;
            if let Some(critical) = sensor.critical {
                sink.gauge(&self.critical, f64::from(critical), &labels)?;
            }
        }

        Ok(())
    }
}
