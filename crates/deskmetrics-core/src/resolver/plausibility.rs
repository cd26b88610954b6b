use crate::device::SensorKind;

/// Bounds separating usable readings from sensor noise.
///
/// Only temperatures are checked: drivers report 0 °C for disconnected
/// probes and 255 °C (or -128 °C) for invalid registers. Both bounds are
/// exclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlausibilityPolicy {
    pub temperature_min: f32,
    pub temperature_max: f32,
}

impl PlausibilityPolicy {
    pub fn new(temperature_min: f32, temperature_max: f32) -> Self {
        Self {
            temperature_min,
            temperature_max,
        }
    }

    pub fn is_plausible(&self, kind: SensorKind, value: f32) -> bool {
        match kind {
            SensorKind::Temperature => {
                value > self.temperature_min && value < self.temperature_max
            }
            SensorKind::Power | SensorKind::Load | SensorKind::Fan => true,
        }
    }
}

impl Default for PlausibilityPolicy {
    fn default() -> Self {
        Self::new(0.0, 120.0)
    }
}
