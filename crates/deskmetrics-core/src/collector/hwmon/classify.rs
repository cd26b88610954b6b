//! Mapping of hwmon driver names and labels onto the device model.
//!
//! Kernel drivers name their chips and channels inconsistently ("Tctl",
//! "Package id 0", "junction", "Coolant temp"). Labels that carry a well
//! known meaning are rewritten to the names the resolver's keyword lists
//! look for; everything else is passed through untouched.

use crate::device::{HardwareKind, SensorKind};

const CPU_DRIVERS: &[&str] = &[
    "k10temp",
    "coretemp",
    "zenpower",
    "fam15h_power",
    "cpu_thermal",
    "via_cputemp",
];

const GPU_DRIVERS: &[&str] = &["amdgpu", "radeon", "nouveau", "i915", "xe"];

const STORAGE_DRIVERS: &[&str] = &["nvme", "drivetemp"];

const MEMORY_DRIVERS: &[&str] = &["jc42", "spd5118", "ee1004"];

const PSU_DRIVERS: &[&str] = &["corsairpsu", "nzxt-smart-psu"];

/// Prefix matches: Super-I/O chips and firmware interfaces on the board.
const BOARD_PREFIXES: &[&str] = &[
    "nct", "it87", "it86", "w83", "f71", "asus", "acpitz", "gigabyte", "dell_smm", "thinkpad",
    "pch_", "lm75", "lm78", "lm85", "sch5",
];

/// AIO coolers and pumps.
const COOLER_PREFIXES: &[&str] = &["kraken", "x53", "z53", "d5next", "aquastream"];

/// Fan hubs and loop controllers.
const CONTROLLER_PREFIXES: &[&str] = &[
    "corsaircpro",
    "nzxtsmart",
    "octo",
    "quadro",
    "aquaero",
    "farbwerk",
    "highflow",
    "leakshield",
];

const NETWORK_PREFIXES: &[&str] = &[
    "r8169", "mlx", "atlantic", "aqc", "igb", "igc", "ixgbe", "iwlwifi", "mt79", "ath1", "bnxt",
];

/// Classifies a hwmon chip by the content of its `name` attribute.
///
/// Returns `None` for chips that do not belong to any known category.
pub fn classify_chip(driver: &str) -> Option<HardwareKind> {
    let driver = driver.trim().to_ascii_lowercase();
    let driver = driver.as_str();

    if CPU_DRIVERS.contains(&driver) {
        Some(HardwareKind::Cpu)
    } else if GPU_DRIVERS.contains(&driver) {
        Some(HardwareKind::Gpu)
    } else if STORAGE_DRIVERS.contains(&driver) {
        Some(HardwareKind::Storage)
    } else if MEMORY_DRIVERS.contains(&driver) {
        Some(HardwareKind::Memory)
    } else if PSU_DRIVERS.contains(&driver) {
        Some(HardwareKind::Psu)
    } else if starts_with_any(driver, COOLER_PREFIXES) {
        Some(HardwareKind::Cooler)
    } else if starts_with_any(driver, CONTROLLER_PREFIXES) {
        Some(HardwareKind::Controller)
    } else if starts_with_any(driver, BOARD_PREFIXES) {
        Some(HardwareKind::Motherboard)
    } else if starts_with_any(driver, NETWORK_PREFIXES) {
        Some(HardwareKind::Network)
    } else {
        None
    }
}

fn starts_with_any(s: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|p| s.starts_with(p))
}

/// Name for a channel without a `*_label` attribute, e.g. "Temperature #2".
pub fn default_label(kind: HardwareKind, sensor: SensorKind, index: u32) -> String {
    // Single-channel GPU drivers (nouveau) expose the die temperature as temp1.
    if kind == HardwareKind::Gpu && sensor == SensorKind::Temperature && index == 1 {
        return "GPU Core".to_string();
    }
    format!("{} #{}", sensor, index)
}

/// Rewrites driver-specific labels to their conventional names.
pub fn canonical_label(driver: &str, kind: HardwareKind, label: &str) -> String {
    let label = label.trim();
    let lower = label.to_ascii_lowercase();

    match kind {
        HardwareKind::Cpu => {
            if lower.starts_with("package id") {
                return "CPU Package".to_string();
            }
            if lower == "tctl" || lower == "tdie" {
                return format!("CPU Package ({})", label);
            }
        }
        HardwareKind::Gpu => match lower.as_str() {
            "edge" => return "GPU Core".to_string(),
            "junction" => return "GPU Hot Spot".to_string(),
            "mem" => return "GPU Memory Junction".to_string(),
            "ppt" | "slowppt" if driver.eq_ignore_ascii_case("amdgpu") => {
                return "GPU Package".to_string();
            }
            _ => {}
        },
        HardwareKind::Cooler | HardwareKind::Controller => {
            if matches!(
                lower.as_str(),
                "coolant temp" | "liquid temp" | "water temp" | "coolant temperature"
            ) {
                return "Water Temperature".to_string();
            }
        }
        _ => {}
    }

    label.to_string()
}
