//! Runtime configuration of the monitor. Built by the caller (the daemon
//! fills it from CLI arguments and environment) and never persisted.

use std::path::PathBuf;
use std::time::Duration;

use crate::device::Categories;
use crate::resolver::PlausibilityPolicy;

/// Name of the per-user data sub-directory.
pub const APP_DIR_NAME: &str = "deskmetrics";

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("refresh interval must be greater than zero")]
    ZeroInterval,

    #[error("temperature bounds are empty: min {min} must be below max {max}")]
    EmptyTemperatureRange { min: f32, max: f32 },
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub interval: Duration,
    pub policy: PlausibilityPolicy,
    pub sys_root: PathBuf,
    pub proc_root: PathBuf,
    pub categories: Categories,
    pub dump_dir: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            policy: PlausibilityPolicy::default(),
            sys_root: PathBuf::from("/sys"),
            proc_root: PathBuf::from("/proc"),
            categories: Categories::all(),
            dump_dir: default_dump_dir(),
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        let (min, max) = (self.policy.temperature_min, self.policy.temperature_max);
        // Also rejects NaN bounds.
        if !(min < max) {
            return Err(ConfigError::EmptyTemperatureRange { min, max });
        }
        Ok(())
    }
}

/// `<local data dir>/deskmetrics`, or a directory under the system temp
/// dir when the platform has no local data dir.
pub fn default_dump_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.interval, Duration::from_secs(1));
        assert_eq!(config.policy, PlausibilityPolicy::new(0.0, 120.0));
        assert_eq!(config.sys_root, PathBuf::from("/sys"));
        assert_eq!(config.categories, Categories::all());
        assert!(config.dump_dir.ends_with(APP_DIR_NAME));
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = MonitorConfig {
            interval: Duration::ZERO,
            ..MonitorConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroInterval));

        let config = MonitorConfig {
            policy: PlausibilityPolicy::new(90.0, 10.0),
            ..MonitorConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyTemperatureRange { .. })
        ));

        let config = MonitorConfig {
            policy: PlausibilityPolicy::new(f32::NAN, 10.0),
            ..MonitorConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
