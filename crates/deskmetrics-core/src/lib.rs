//! deskmetrics-core - hardware telemetry resolution library.
//!
//! Provides:
//! - `device` - device tree model, adapter trait, shared hub
//! - `collector` - Linux hwmon adapter and mock filesystem
//! - `resolver` - plausibility filter and per-metric resolution
//! - `snapshot` - immutable snapshots and their assembly
//! - `scheduler` - periodic single-flight refresh
//! - `service` - hub, assembler and scheduler as one unit
//! - `dump` - raw sensor dump to file
//! - `fmt` - value formatting for display
//! - `config` - runtime configuration

pub mod collector;
pub mod config;
pub mod device;
pub mod dump;
pub mod fmt;
pub mod resolver;
pub mod scheduler;
pub mod service;
pub mod snapshot;

pub use config::MonitorConfig;
pub use resolver::{LogicalMetric, PlausibilityPolicy};
pub use scheduler::{CycleError, CycleOutcome, RefreshScheduler, SchedulerState};
pub use service::{MonitorService, ServiceError};
pub use snapshot::MetricsSnapshot;
