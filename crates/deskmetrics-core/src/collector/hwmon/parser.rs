//! Parsers for hwmon attributes and the procfs/powercap counters used to
//! derive CPU load and package power.

use std::time::Instant;

use crate::device::SensorKind;

/// Which flavour of a channel attribute a file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AttrSuffix {
    Input,
    Average,
}

/// A parsed hwmon value attribute name such as `temp2_input`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelAttr {
    pub sensor: SensorKind,
    pub prefix: &'static str,
    pub index: u32,
    pub suffix: AttrSuffix,
}

impl ChannelAttr {
    /// File name of the matching label attribute, e.g. `temp2_label`.
    pub fn label_file(&self) -> String {
        format!("{}{}_label", self.prefix, self.index)
    }

    /// Converts a raw sysfs integer into the reading's unit.
    pub fn scale(&self, raw: f64) -> f32 {
        let value = match self.sensor {
            // millidegree Celsius
            SensorKind::Temperature => raw / 1000.0,
            // microwatt
            SensorKind::Power => raw / 1_000_000.0,
            SensorKind::Fan | SensorKind::Load => raw,
        };
        value as f32
    }
}

/// Parses an attribute file name. Returns `None` for anything that is not a
/// temperature, fan or power value attribute.
pub fn parse_channel_attr(file_name: &str) -> Option<ChannelAttr> {
    let (stem, suffix) = if let Some(stem) = file_name.strip_suffix("_input") {
        (stem, AttrSuffix::Input)
    } else if let Some(stem) = file_name.strip_suffix("_average") {
        (stem, AttrSuffix::Average)
    } else {
        return None;
    };

    let (sensor, prefix) = if stem.starts_with("temp") {
        (SensorKind::Temperature, "temp")
    } else if stem.starts_with("fan") {
        (SensorKind::Fan, "fan")
    } else if stem.starts_with("power") {
        (SensorKind::Power, "power")
    } else {
        return None;
    };

    // Only power channels have meaningful averages.
    if suffix == AttrSuffix::Average && sensor != SensorKind::Power {
        return None;
    }

    let index = stem[prefix.len()..].parse::<u32>().ok()?;
    Some(ChannelAttr {
        sensor,
        prefix,
        index,
        suffix,
    })
}

/// Parses a sysfs numeric attribute (integer, possibly with trailing newline).
pub fn parse_raw_value(content: &str) -> Option<f64> {
    content.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Aggregate CPU time counters from the first line of `/proc/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    pub busy: u64,
    pub total: u64,
}

impl CpuTimes {
    /// CPU utilisation in percent between `prev` and `self`.
    pub fn load_since(&self, prev: &CpuTimes) -> Option<f32> {
        let total = self.total.checked_sub(prev.total)?;
        let busy = self.busy.checked_sub(prev.busy)?;
        if total == 0 {
            return None;
        }
        Some((busy as f64 / total as f64 * 100.0) as f32)
    }
}

/// Parses the aggregate `cpu` line of `/proc/stat`.
///
/// Columns: user nice system idle iowait irq softirq steal [guest guest_nice].
/// Guest time is already accounted in user/nice and is not added again.
pub fn parse_cpu_times(stat: &str) -> Option<CpuTimes> {
    let line = stat.lines().find(|l| l.starts_with("cpu "))?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(|f| f.parse::<u64>())
        .collect::<Result<_, _>>()
        .ok()?;
    if fields.len() < 4 {
        return None;
    }
    let total: u64 = fields.iter().sum();
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    Some(CpuTimes {
        busy: total.saturating_sub(idle),
        total,
    })
}

/// Returns the first `model name` entry of `/proc/cpuinfo`.
pub fn parse_model_name(cpuinfo: &str) -> Option<String> {
    cpuinfo.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key.trim() == "model name" {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        } else {
            None
        }
    })
}

/// One reading of a RAPL energy counter.
#[derive(Debug, Clone, Copy)]
pub struct EnergySample {
    pub microjoules: u64,
    pub at: Instant,
}

/// Average power in watts between two RAPL samples.
///
/// Handles a single counter wrap when `max_range_uj` is known.
pub fn rapl_watts(prev: &EnergySample, cur: &EnergySample, max_range_uj: Option<u64>) -> Option<f32> {
    let elapsed = cur.at.checked_duration_since(prev.at)?.as_secs_f64();
    if elapsed <= 0.0 {
        return None;
    }
    let delta = if cur.microjoules >= prev.microjoules {
        cur.microjoules - prev.microjoules
    } else {
        let range = max_range_uj?;
        range.checked_sub(prev.microjoules)? + cur.microjoules
    };
    Some((delta as f64 / 1_000_000.0 / elapsed) as f32)
}
