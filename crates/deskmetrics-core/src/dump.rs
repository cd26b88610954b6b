//! Raw sensor dump for diagnosing what a machine actually exposes.
//!
//! Lists every node, sub-node and reading exactly as the adapter reports
//! them: no plausibility filtering, no scoring.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{info, warn};

use crate::device::{DeviceTree, HardwareNode, NodePath, refresh_subtree};

#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    #[error("failed to write dump to {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// File name for a dump taken at `at`, e.g. `SensorDump_20260102_030405.txt`.
pub fn dump_file_name(at: &DateTime<Local>) -> String {
    format!("SensorDump_{}.txt", at.format("%Y%m%d_%H%M%S"))
}

/// Renders the report for `roots`.
pub fn render(roots: &[HardwareNode], at: &DateTime<Local>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "===== deskmetrics sensor dump =====");
    let _ = writeln!(out, "Captured: {}", at.format("%Y-%m-%d %H:%M:%S %:z"));
    let _ = writeln!(out, "-----------------------------------");
    let _ = writeln!(out);

    for root in roots {
        render_node(&mut out, root, 0);
        let _ = writeln!(out);
    }
    out
}

fn render_node(out: &mut String, node: &HardwareNode, depth: usize) {
    let indent = "  ".repeat(depth);
    let tag = if depth == 0 { "Hardware" } else { "SubHardware" };
    let _ = writeln!(out, "{}[{}] {} | {}", indent, tag, node.kind, node.name);

    for sensor in &node.sensors {
        let value = sensor.value.map(|v| v.to_string()).unwrap_or_default();
        let _ = writeln!(
            out,
            "{}  Sensor: {:<12} | {:<30} | Value={}",
            indent,
            sensor.kind.to_string(),
            sensor.name,
            value
        );
    }
    for child in &node.children {
        render_node(out, child, depth + 1);
    }
}

/// Refreshes the whole forest, renders it and writes it to a timestamped
/// file under `dir` (created if missing). Returns the file path.
///
/// A node that fails to refresh is dumped with its previous readings.
pub fn dump_all(tree: &mut dyn DeviceTree, dir: &Path) -> Result<PathBuf, DumpError> {
    for index in 0..tree.roots().len() {
        let path = NodePath::root(index);
        if let Err(e) = refresh_subtree(tree, &path) {
            warn!(node = %path, error = %e, "refresh failed during dump");
        }
    }

    let now = Local::now();
    let report = render(tree.roots(), &now);

    std::fs::create_dir_all(dir).map_err(|source| DumpError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let file = dir.join(dump_file_name(&now));
    std::fs::write(&file, report).map_err(|source| DumpError::Io {
        path: file.clone(),
        source,
    })?;

    info!(path = %file.display(), "sensor dump written");
    Ok(file)
}
