//! Shared formatting helpers for metric values.
//!
//! Temperatures and power are shown with one decimal, rotational speed with
//! none. A missing value is always shown as `"n/a"`.

use crate::resolver::{LogicalMetric, MetricUnit};
use crate::snapshot::MetricsSnapshot;

/// Placeholder for an unavailable value.
pub const NOT_AVAILABLE: &str = "n/a";

// ---------------------------------------------------------------------------
// Single values
// ---------------------------------------------------------------------------

/// `"61.5 °C"`
pub fn format_temperature(value: Option<f32>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| format!("{:.1} °C", v))
}

/// `"187.0 W"`
pub fn format_power(value: Option<f32>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| format!("{:.1} W", v))
}

/// `"12.5 %"`
pub fn format_load(value: Option<f32>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| format!("{:.1} %", v))
}

/// `"2400 RPM"`
pub fn format_rpm(value: Option<f32>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| format!("{:.0} RPM", v))
}

/// Formats `value` in the unit of `metric`.
pub fn format_metric(metric: LogicalMetric, value: Option<f32>) -> String {
    match metric.unit() {
        MetricUnit::Celsius => format_temperature(value),
        MetricUnit::Watts => format_power(value),
        MetricUnit::Percent => format_load(value),
        MetricUnit::Rpm => format_rpm(value),
    }
}

// ---------------------------------------------------------------------------
// Snapshot lines
// ---------------------------------------------------------------------------

/// One console line for a snapshot:
/// `"12:00:01  CPU 61.5 °C | CPU load 12.5 % | ... | RAM n/a"`.
pub fn format_snapshot_line(snapshot: &MetricsSnapshot) -> String {
    let fields: Vec<String> = snapshot
        .iter()
        .map(|(metric, value)| format!("{} {}", metric.label(), format_metric(metric, value)))
        .collect();
    format!(
        "{}  {}",
        snapshot
            .captured_at()
            .with_timezone(&chrono::Local)
            .format("%H:%M:%S"),
        fields.join(" | ")
    )
}
