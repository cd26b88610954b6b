//! Immutable per-cycle metric snapshots and the assembler that builds them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::{trace, warn};

use crate::device::{AdapterError, DeviceHub};
use crate::resolver::{LogicalMetric, PlausibilityPolicy, resolve};

/// One resolved value per [`LogicalMetric`], captured at a single instant.
///
/// `None` means the metric is unavailable on this machine or failed to
/// resolve during this cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    values: [Option<f32>; LogicalMetric::COUNT],
    captured_at: DateTime<Utc>,
}

impl MetricsSnapshot {
    /// A snapshot with every metric unavailable.
    pub fn empty(captured_at: DateTime<Utc>) -> Self {
        Self {
            values: [None; LogicalMetric::COUNT],
            captured_at,
        }
    }

    /// Returns a copy with `metric` set to `value`.
    pub fn with(mut self, metric: LogicalMetric, value: Option<f32>) -> Self {
        self.values[metric.index()] = value;
        self
    }

    pub fn get(&self, metric: LogicalMetric) -> Option<f32> {
        self.values[metric.index()]
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// `(metric, value)` pairs in [`LogicalMetric::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (LogicalMetric, Option<f32>)> + '_ {
        LogicalMetric::ALL.into_iter().map(|m| (m, self.get(m)))
    }

    /// Number of metrics that resolved to a value.
    pub fn available(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    pub fn cpu_temperature(&self) -> Option<f32> {
        self.get(LogicalMetric::CpuTemperature)
    }

    pub fn cpu_load(&self) -> Option<f32> {
        self.get(LogicalMetric::CpuLoad)
    }

    pub fn cpu_power(&self) -> Option<f32> {
        self.get(LogicalMetric::CpuPower)
    }

    pub fn gpu_temperature(&self) -> Option<f32> {
        self.get(LogicalMetric::GpuTemperature)
    }

    pub fn gpu_load(&self) -> Option<f32> {
        self.get(LogicalMetric::GpuLoad)
    }

    pub fn gpu_power(&self) -> Option<f32> {
        self.get(LogicalMetric::GpuPower)
    }

    pub fn board_temperature(&self) -> Option<f32> {
        self.get(LogicalMetric::BoardTemperature)
    }

    pub fn storage_max_temperature(&self) -> Option<f32> {
        self.get(LogicalMetric::StorageMaxTemperature)
    }

    pub fn coolant_temperature(&self) -> Option<f32> {
        self.get(LogicalMetric::CoolantTemperature)
    }

    pub fn pump_speed(&self) -> Option<f32> {
        self.get(LogicalMetric::PumpSpeed)
    }

    pub fn ram_temperature(&self) -> Option<f32> {
        self.get(LogicalMetric::RamTemperature)
    }
}

/// Flat map: `captured_at` (RFC 3339) followed by one key per metric.
impl Serialize for MetricsSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len() + 1))?;
        map.serialize_entry("captured_at", &self.captured_at.to_rfc3339())?;
        for (metric, value) in self.iter() {
            map.serialize_entry(metric.key(), &value)?;
        }
        map.end()
    }
}

/// Errors that abort a whole assembly cycle.
#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    #[error("device tree unavailable: {0}")]
    Device(#[from] AdapterError),
}

/// Builds a [`MetricsSnapshot`] by resolving every metric against the hub.
#[derive(Clone)]
pub struct SnapshotAssembler {
    hub: Arc<DeviceHub>,
    policy: PlausibilityPolicy,
}

impl SnapshotAssembler {
    pub fn new(hub: Arc<DeviceHub>, policy: PlausibilityPolicy) -> Self {
        Self { hub, policy }
    }

    pub fn hub(&self) -> &Arc<DeviceHub> {
        &self.hub
    }

    /// Resolves every metric once.
    ///
    /// Each metric takes its own lease, so other tree users (a dump) can
    /// interleave between metrics. A metric that fails to resolve is
    /// recorded as unavailable; only a closed hub fails the cycle.
    pub fn assemble(&self) -> Result<MetricsSnapshot, AssembleError> {
        let mut snapshot = MetricsSnapshot::empty(Utc::now());

        for metric in LogicalMetric::ALL {
            let mut lease = self.hub.lease()?;
            let value = match resolve(&mut *lease, metric, &self.policy) {
                Ok(value) => value,
                Err(e) => {
                    warn!(metric = %metric, error = %e, "metric resolution failed");
                    None
                }
            };
            drop(lease);
            trace!(metric = %metric, value = ?value, "metric resolved");
            snapshot = snapshot.with(metric, value);
        }

        Ok(snapshot)
    }
}
