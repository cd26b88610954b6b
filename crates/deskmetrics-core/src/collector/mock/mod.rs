//! Mock filesystem for testing and for running on hosts without hwmon.

mod filesystem;
mod scenarios;

pub use filesystem::MockFs;
