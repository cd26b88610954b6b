//! Logical metrics and how each one is located in the device tree.

use std::fmt;

use crate::device::{HardwareKind, SensorKind};

/// A value shown to the user, resolved from many raw readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalMetric {
    CpuTemperature,
    CpuLoad,
    CpuPower,
    GpuTemperature,
    GpuLoad,
    GpuPower,
    BoardTemperature,
    StorageMaxTemperature,
    CoolantTemperature,
    PumpSpeed,
    RamTemperature,
}

/// Display unit of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricUnit {
    Celsius,
    Watts,
    Percent,
    Rpm,
}

/// How the winning reading is picked among the candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// First node of the kind; plausible readings (falling back to all
    /// readings) ranked by keyword score, then by value.
    Ranked { keywords: &'static [&'static str] },
    /// First node of the kind; hottest plausible reading, no fallback.
    Hottest,
    /// Every node of the kind; hottest plausible reading per node, then the
    /// maximum across nodes.
    AggregateMax,
    /// First node of the kind; first reading whose name contains `label`.
    FirstMatch { label: &'static str },
}

/// Where a metric lives: device kind, sensor kind and selection rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricSpec {
    pub hardware: HardwareKind,
    pub sensor: SensorKind,
    pub selection: Selection,
}

impl LogicalMetric {
    pub const COUNT: usize = 11;

    /// All metrics, in snapshot order.
    pub const ALL: [LogicalMetric; Self::COUNT] = [
        LogicalMetric::CpuTemperature,
        LogicalMetric::CpuLoad,
        LogicalMetric::CpuPower,
        LogicalMetric::GpuTemperature,
        LogicalMetric::GpuLoad,
        LogicalMetric::GpuPower,
        LogicalMetric::BoardTemperature,
        LogicalMetric::StorageMaxTemperature,
        LogicalMetric::CoolantTemperature,
        LogicalMetric::PumpSpeed,
        LogicalMetric::RamTemperature,
    ];

    /// Position in [`LogicalMetric::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Machine-readable key, used in JSON output.
    pub fn key(self) -> &'static str {
        match self {
            LogicalMetric::CpuTemperature => "cpu_temperature",
            LogicalMetric::CpuLoad => "cpu_load",
            LogicalMetric::CpuPower => "cpu_power",
            LogicalMetric::GpuTemperature => "gpu_temperature",
            LogicalMetric::GpuLoad => "gpu_load",
            LogicalMetric::GpuPower => "gpu_power",
            LogicalMetric::BoardTemperature => "board_temperature",
            LogicalMetric::StorageMaxTemperature => "storage_max_temperature",
            LogicalMetric::CoolantTemperature => "coolant_temperature",
            LogicalMetric::PumpSpeed => "pump_speed",
            LogicalMetric::RamTemperature => "ram_temperature",
        }
    }

    /// Short human label.
    pub fn label(self) -> &'static str {
        match self {
            LogicalMetric::CpuTemperature => "CPU",
            LogicalMetric::CpuLoad => "CPU load",
            LogicalMetric::CpuPower => "CPU power",
            LogicalMetric::GpuTemperature => "GPU",
            LogicalMetric::GpuLoad => "GPU load",
            LogicalMetric::GpuPower => "GPU power",
            LogicalMetric::BoardTemperature => "Board",
            LogicalMetric::StorageMaxTemperature => "SSD",
            LogicalMetric::CoolantTemperature => "Water",
            LogicalMetric::PumpSpeed => "Pump",
            LogicalMetric::RamTemperature => "RAM",
        }
    }

    pub fn unit(self) -> MetricUnit {
        match self.spec().sensor {
            SensorKind::Temperature => MetricUnit::Celsius,
            SensorKind::Power => MetricUnit::Watts,
            SensorKind::Load => MetricUnit::Percent,
            SensorKind::Fan => MetricUnit::Rpm,
        }
    }

    pub fn spec(self) -> MetricSpec {
        use HardwareKind as H;
        use SensorKind as S;

        let (hardware, sensor, selection) = match self {
            LogicalMetric::CpuTemperature => (
                H::Cpu,
                S::Temperature,
                Selection::Ranked {
                    keywords: &["CPU Package", "Core Max", "Core Average"],
                },
            ),
            LogicalMetric::CpuLoad => (
                H::Cpu,
                S::Load,
                Selection::Ranked {
                    keywords: &["CPU Package"],
                },
            ),
            LogicalMetric::CpuPower => (
                H::Cpu,
                S::Power,
                Selection::Ranked {
                    keywords: &["CPU Package"],
                },
            ),
            LogicalMetric::GpuTemperature => (
                H::Gpu,
                S::Temperature,
                Selection::Ranked {
                    keywords: &["hot spot", "hotspot", "gpu core"],
                },
            ),
            LogicalMetric::GpuLoad => (
                H::Gpu,
                S::Load,
                Selection::Ranked {
                    keywords: &["GPU Package"],
                },
            ),
            LogicalMetric::GpuPower => (
                H::Gpu,
                S::Power,
                Selection::Ranked {
                    keywords: &["GPU Package"],
                },
            ),
            LogicalMetric::BoardTemperature => (H::Motherboard, S::Temperature, Selection::Hottest),
            LogicalMetric::StorageMaxTemperature => {
                (H::Storage, S::Temperature, Selection::AggregateMax)
            }
            LogicalMetric::CoolantTemperature => (
                H::Cooler,
                S::Temperature,
                Selection::FirstMatch {
                    label: "Water Temperature",
                },
            ),
            LogicalMetric::PumpSpeed => (H::Cooler, S::Fan, Selection::FirstMatch { label: "Pump" }),
            LogicalMetric::RamTemperature => {
                (H::Memory, S::Temperature, Selection::Ranked { keywords: &[] })
            }
        };

        MetricSpec {
            hardware,
            sensor,
            selection,
        }
    }
}

impl fmt::Display for LogicalMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
