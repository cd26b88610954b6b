//! Device tree backed by the Linux hwmon class (`/sys/class/hwmon`).
//!
//! Every hwmon chip is classified by its driver name. CPU, motherboard and
//! memory chips are grouped under one synthesized root node each (one
//! sub-node per chip); every other chip becomes a root of its own, so e.g.
//! each NVMe drive is a separate storage node.
//!
//! The CPU root additionally carries a `Load` reading derived from
//! `/proc/stat` and, where RAPL is readable, a package `Power` reading.
//! Both are deltas and stay empty until a refresh sees the counters move.
//! Refreshes closer together than that keep the previous baseline and report
//! the last computed value, so several refreshes within one snapshot cycle
//! all see the load and power of the whole interval.

mod classify;
mod parser;

pub use classify::{canonical_label, classify_chip};

use std::cmp::Reverse;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

use crate::collector::traits::FileSystem;
use crate::device::{
    AdapterError, Categories, DeviceTree, HardwareKind, HardwareNode, NodePath, SensorKind,
    SensorReading, node_at_mut,
};

use classify::default_label;
use parser::{
    AttrSuffix, ChannelAttr, CpuTimes, EnergySample, parse_channel_attr, parse_cpu_times,
    parse_model_name, parse_raw_value, rapl_watts,
};

/// Shortest RAPL sampling window that yields a power value.
const MIN_RAPL_WINDOW: Duration = Duration::from_millis(100);

/// Where a node's readings come from.
#[derive(Debug, Clone)]
enum NodeSource {
    /// A hwmon chip directory.
    Chip {
        dir: PathBuf,
        driver: String,
        kind: HardwareKind,
    },
    /// The synthesized CPU root (procfs load + RAPL power).
    CpuPackage,
    /// A synthesized grouping node without readings of its own.
    Group,
}

/// A discovered chip before the forest is built.
struct ChipEntry {
    index: usize,
    dir: PathBuf,
    driver: String,
    kind: HardwareKind,
}

/// [`DeviceTree`] implementation over sysfs hwmon.
pub struct HwmonTree<F: FileSystem> {
    fs: F,
    sys_root: PathBuf,
    proc_root: PathBuf,
    roots: Vec<HardwareNode>,
    sources: HashMap<NodePath, NodeSource>,
    cpu_times: Option<CpuTimes>,
    cpu_load: Option<f32>,
    energy: Option<EnergySample>,
    package_watts: Option<f32>,
}

impl<F: FileSystem> HwmonTree<F> {
    /// Opens the adapter: enumerates chips under `<sys_root>/class/hwmon`,
    /// keeps those in an enabled category, and performs an initial refresh
    /// of every node.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `sys_root` - Base path of sysfs (usually "/sys")
    /// * `proc_root` - Base path of procfs (usually "/proc")
    /// * `categories` - Device categories to expose
    pub fn open(
        fs: F,
        sys_root: impl Into<PathBuf>,
        proc_root: impl Into<PathBuf>,
        categories: &Categories,
    ) -> Result<Self, AdapterError> {
        let sys_root = sys_root.into();
        let proc_root = proc_root.into();
        let hwmon_dir = sys_root.join("class/hwmon");

        let entries = fs
            .read_dir(&hwmon_dir)
            .map_err(|source| AdapterError::Open {
                path: hwmon_dir.display().to_string(),
                source,
            })?;

        let mut chips = Vec::new();
        for dir in entries {
            let Some(index) = hwmon_index(&dir) else {
                continue;
            };
            let Ok(driver) = fs.read_to_string(&dir.join("name")) else {
                debug!(path = %dir.display(), "hwmon chip without name, skipped");
                continue;
            };
            let driver = driver.trim().to_string();
            let Some(kind) = classify_chip(&driver) else {
                debug!(driver = %driver, "unclassified hwmon chip, skipped");
                continue;
            };
            if !categories.contains(kind) {
                trace!(driver = %driver, kind = %kind, "category disabled, skipped");
                continue;
            }
            chips.push(ChipEntry {
                index,
                dir,
                driver,
                kind,
            });
        }
        chips.sort_by_key(|c| (c.kind, c.index));

        let mut tree = Self {
            fs,
            sys_root,
            proc_root,
            roots: Vec::new(),
            sources: HashMap::new(),
            cpu_times: None,
            cpu_load: None,
            energy: None,
            package_watts: None,
        };
        tree.build_forest(chips, categories);

        for path in tree.all_paths() {
            if let Err(e) = tree.refresh_node(&path) {
                debug!(node = %path, error = %e, "initial refresh failed");
            }
        }

        info!(
            roots = tree.roots.len(),
            nodes = tree.roots.iter().map(HardwareNode::subtree_len).sum::<usize>(),
            "hwmon device tree opened"
        );
        Ok(tree)
    }

    fn build_forest(&mut self, chips: Vec<ChipEntry>, categories: &Categories) {
        let has_proc_stat = self.fs.exists(&self.proc_root.join("stat"));

        for kind in HardwareKind::ALL {
            if !categories.contains(kind) {
                continue;
            }
            let of_kind: Vec<&ChipEntry> = chips.iter().filter(|c| c.kind == kind).collect();

            match kind {
                HardwareKind::Cpu | HardwareKind::Motherboard | HardwareKind::Memory => {
                    let synthesize_cpu = kind == HardwareKind::Cpu && has_proc_stat;
                    if of_kind.is_empty() && !synthesize_cpu {
                        continue;
                    }
                    let root_path = NodePath::root(self.roots.len());
                    let mut root = HardwareNode::new(kind, self.group_name(kind))
                        .with_identifier(format!("/{}", kind.as_str()));
                    let source = if kind == HardwareKind::Cpu {
                        NodeSource::CpuPackage
                    } else {
                        NodeSource::Group
                    };
                    self.sources.insert(root_path.clone(), source);

                    for (i, chip) in of_kind.iter().enumerate() {
                        root.children.push(self.chip_node(chip));
                        self.sources.insert(root_path.child(i), chip_source(chip));
                    }
                    self.roots.push(root);
                }
                _ => {
                    for chip in of_kind {
                        let path = NodePath::root(self.roots.len());
                        let node = self.chip_node(chip);
                        self.roots.push(node);
                        self.sources.insert(path, chip_source(chip));
                    }
                }
            }
        }
    }

    fn chip_node(&self, chip: &ChipEntry) -> HardwareNode {
        // nvme and drivetemp expose the drive model behind the device link.
        let name = self
            .fs
            .read_to_string(&chip.dir.join("device/model"))
            .ok()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| chip.driver.clone());
        HardwareNode::new(chip.kind, name).with_identifier(chip.dir.display().to_string())
    }

    fn group_name(&self, kind: HardwareKind) -> String {
        match kind {
            HardwareKind::Cpu => self
                .fs
                .read_to_string(&self.proc_root.join("cpuinfo"))
                .ok()
                .and_then(|info| parse_model_name(&info))
                .unwrap_or_else(|| "CPU".to_string()),
            HardwareKind::Motherboard => {
                let read = |file: &str| {
                    self.fs
                        .read_to_string(&self.sys_root.join("class/dmi/id").join(file))
                        .ok()
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                };
                match (read("board_vendor"), read("board_name")) {
                    (Some(vendor), Some(board)) => format!("{} {}", vendor, board),
                    (None, Some(board)) => board,
                    _ => "Motherboard".to_string(),
                }
            }
            HardwareKind::Memory => "Memory".to_string(),
            other => other.to_string(),
        }
    }

    fn all_paths(&self) -> Vec<NodePath> {
        let mut paths: Vec<NodePath> = self.sources.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Reads every value attribute of a chip directory.
    fn read_chip(
        &self,
        dir: &Path,
        driver: &str,
        kind: HardwareKind,
    ) -> Result<Vec<SensorReading>, AdapterError> {
        let files = self.fs.read_dir(dir).map_err(|e| AdapterError::Refresh {
            node: dir.display().to_string(),
            detail: e.to_string(),
        })?;

        let mut channels: Vec<(ChannelAttr, PathBuf)> = files
            .into_iter()
            .filter_map(|path| {
                let file_name = path.file_name()?.to_str()?;
                parse_channel_attr(file_name).map(|attr| (attr, path.clone()))
            })
            .collect();

        // powerN_average wins over powerN_input for the same channel.
        channels.sort_by_key(|(attr, _)| {
            (sensor_order(attr.sensor), attr.index, Reverse(attr.suffix))
        });
        channels.dedup_by(|later, kept| {
            later.0.sensor == kept.0.sensor && later.0.index == kept.0.index
        });

        let mut readings = Vec::with_capacity(channels.len() + 1);
        for (attr, path) in channels {
            let value = self
                .fs
                .read_to_string(&path)
                .ok()
                .and_then(|content| parse_raw_value(&content))
                .map(|raw| attr.scale(raw));
            let name = match self.fs.read_to_string(&dir.join(attr.label_file())) {
                Ok(label) if !label.trim().is_empty() => canonical_label(driver, kind, &label),
                _ => default_label(kind, attr.sensor, attr.index),
            };
            readings.push(SensorReading::new(attr.sensor, name, value));
        }

        if kind == HardwareKind::Gpu {
            let busy = dir.join("device/gpu_busy_percent");
            if self.fs.exists(&busy) {
                let value = self
                    .fs
                    .read_to_string(&busy)
                    .ok()
                    .and_then(|content| parse_raw_value(&content))
                    .map(|v| v as f32);
                readings.push(SensorReading::new(SensorKind::Load, "GPU Core", value));
            }
        }

        Ok(readings)
    }

    /// Readings of the synthesized CPU root.
    fn read_cpu_package(&mut self) -> Vec<SensorReading> {
        let mut readings = Vec::with_capacity(2);

        let times = self
            .fs
            .read_to_string(&self.proc_root.join("stat"))
            .ok()
            .and_then(|stat| parse_cpu_times(&stat));
        let load = match times {
            Some(cur) => {
                self.advance_cpu_times(cur);
                self.cpu_load
            }
            None => None,
        };
        readings.push(SensorReading::new(SensorKind::Load, "CPU Total", load));

        let rapl_dir = self.sys_root.join("class/powercap/intel-rapl:0");
        if self.fs.exists(&rapl_dir) {
            let sample = self
                .fs
                .read_to_string(&rapl_dir.join("energy_uj"))
                .ok()
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(|microjoules| EnergySample {
                    microjoules,
                    at: Instant::now(),
                });
            let max_range = self
                .fs
                .read_to_string(&rapl_dir.join("max_energy_range_uj"))
                .ok()
                .and_then(|s| s.trim().parse::<u64>().ok());
            let watts = match sample {
                Some(cur) => {
                    self.advance_energy(cur, max_range);
                    self.package_watts
                }
                None => None,
            };
            readings.push(SensorReading::new(SensorKind::Power, "CPU Package", watts));
        }

        readings
    }

    /// Moves the `/proc/stat` baseline once jiffies have elapsed. A counter
    /// that went backwards restarts the baseline.
    fn advance_cpu_times(&mut self, cur: CpuTimes) {
        match &self.cpu_times {
            Some(prev) if cur.total > prev.total => {
                self.cpu_load = cur.load_since(prev);
                self.cpu_times = Some(cur);
            }
            Some(prev) if cur.total == prev.total => {}
            _ => {
                self.cpu_load = None;
                self.cpu_times = Some(cur);
            }
        }
    }

    /// Moves the RAPL baseline once at least [`MIN_RAPL_WINDOW`] has passed.
    fn advance_energy(&mut self, cur: EnergySample, max_range: Option<u64>) {
        match &self.energy {
            Some(prev) if cur.at.saturating_duration_since(prev.at) >= MIN_RAPL_WINDOW => {
                self.package_watts = rapl_watts(prev, &cur, max_range);
                self.energy = Some(cur);
            }
            Some(_) => {}
            None => self.energy = Some(cur),
        }
    }
}

impl<F: FileSystem> DeviceTree for HwmonTree<F> {
    fn roots(&self) -> &[HardwareNode] {
        &self.roots
    }

    fn refresh_node(&mut self, path: &NodePath) -> Result<(), AdapterError> {
        let source = self
            .sources
            .get(path)
            .cloned()
            .ok_or_else(|| AdapterError::NodeGone(path.clone()))?;

        let readings = match source {
            NodeSource::Chip { dir, driver, kind } => self.read_chip(&dir, &driver, kind)?,
            NodeSource::CpuPackage => self.read_cpu_package(),
            NodeSource::Group => return Ok(()),
        };

        let node =
            node_at_mut(&mut self.roots, path).ok_or_else(|| AdapterError::NodeGone(path.clone()))?;
        node.sensors = readings;
        Ok(())
    }

    fn close(&mut self) -> Result<(), AdapterError> {
        self.roots.clear();
        self.sources.clear();
        Ok(())
    }
}

fn chip_source(chip: &ChipEntry) -> NodeSource {
    NodeSource::Chip {
        dir: chip.dir.clone(),
        driver: chip.driver.clone(),
        kind: chip.kind,
    }
}

/// Numeric suffix of a `hwmonN` directory.
fn hwmon_index(dir: &Path) -> Option<usize> {
    dir.file_name()?
        .to_str()?
        .strip_prefix("hwmon")?
        .parse::<usize>()
        .ok()
}

fn sensor_order(kind: SensorKind) -> u8 {
    match kind {
        SensorKind::Temperature => 0,
        SensorKind::Power => 1,
        SensorKind::Load => 2,
        SensorKind::Fan => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;
    use crate::device::{collect_readings, node_at};

    fn open_desktop() -> (HwmonTree<MockFs>, MockFs) {
        let fs = MockFs::typical_desktop();
        let tree = HwmonTree::open(fs.clone(), "/sys", "/proc", &Categories::all()).unwrap();
        (tree, fs)
    }

    fn root_names(tree: &HwmonTree<MockFs>) -> Vec<(HardwareKind, String)> {
        tree.roots()
            .iter()
            .map(|n| (n.kind, n.name.clone()))
            .collect()
    }

    #[test]
    fn test_forest_layout() {
        let (tree, _) = open_desktop();
        let roots = root_names(&tree);

        assert_eq!(roots[0].0, HardwareKind::Cpu);
        assert_eq!(roots[0].1, "AMD Ryzen 9 7950X 16-Core Processor");
        assert_eq!(roots[1], (HardwareKind::Gpu, "amdgpu".to_string()));
        assert_eq!(roots[2], (HardwareKind::Motherboard, "ASUSTeK ROG STRIX X670E-E".to_string()));
        assert_eq!(roots[3], (HardwareKind::Storage, "Samsung SSD 990 PRO 2TB".to_string()));
        assert_eq!(roots[4], (HardwareKind::Storage, "WD_BLACK SN850X 1TB".to_string()));
        assert_eq!(roots[5], (HardwareKind::Memory, "Memory".to_string()));
        assert_eq!(roots[6], (HardwareKind::Cooler, "kraken3".to_string()));
        assert_eq!(roots.len(), 7);

        // Board groups its Super-I/O and ACPI chips.
        assert_eq!(tree.roots()[2].children.len(), 2);
        // Memory groups both DIMM sensors.
        assert_eq!(tree.roots()[5].children.len(), 2);
    }

    #[test]
    fn test_chip_readings_are_scaled_and_labelled() {
        let (tree, _) = open_desktop();
        let gpu = &tree.roots()[1];

        let temps: Vec<(&str, Option<f32>)> = collect_readings(gpu, SensorKind::Temperature)
            .iter()
            .map(|r| (r.name.as_str(), r.value))
            .collect();
        assert_eq!(
            temps,
            vec![
                ("GPU Core", Some(52.0)),
                ("GPU Hot Spot", Some(71.0)),
                ("GPU Memory Junction", Some(255.0)),
            ]
        );

        let power = collect_readings(gpu, SensorKind::Power);
        assert_eq!(power.len(), 1);
        assert_eq!(power[0].name, "GPU Package");
        assert_eq!(power[0].value, Some(187.0));

        let load = collect_readings(gpu, SensorKind::Load);
        assert_eq!(load[0].name, "GPU Core");
        assert_eq!(load[0].value, Some(64.0));
    }

    #[test]
    fn test_unlabelled_channels_get_default_names() {
        let (tree, _) = open_desktop();
        let board = &tree.roots()[2];
        let names: Vec<&str> = collect_readings(board, SensorKind::Temperature)
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert!(names.contains(&"Temperature #3"));
        assert!(names.contains(&"SYSTIN"));
    }

    #[test]
    fn test_cpu_load_needs_two_samples() {
        let (mut tree, fs) = open_desktop();
        let cpu_path = NodePath::root(0);

        let load = |tree: &HwmonTree<MockFs>| {
            collect_readings(&tree.roots()[0], SensorKind::Load)
                .first()
                .and_then(|r| r.value)
        };
        // Open primed the counters; nothing to compare against yet.
        assert_eq!(load(&tree), None);

        fs.add_file("/proc/stat", "cpu  200 0 200 1400 200 0 0 0 0 0\n");
        tree.refresh_node(&cpu_path).unwrap();
        let value = load(&tree).unwrap();
        assert!((value - 20.0).abs() < 0.01);
    }

    #[test]
    fn test_back_to_back_refreshes_keep_cpu_baseline() {
        let (mut tree, fs) = open_desktop();
        let cpu_path = NodePath::root(0);
        let load = |tree: &HwmonTree<MockFs>| {
            collect_readings(&tree.roots()[0], SensorKind::Load)
                .first()
                .and_then(|r| r.value)
        };

        fs.add_file("/proc/stat", "cpu  200 0 200 1400 200 0 0 0 0 0\n");
        tree.refresh_node(&cpu_path).unwrap();
        tree.refresh_node(&cpu_path).unwrap();
        tree.refresh_node(&cpu_path).unwrap();
        let value = load(&tree).unwrap();
        assert!((value - 20.0).abs() < 0.01);

        // A counter that went backwards restarts the baseline.
        fs.add_file("/proc/stat", "cpu  10 0 10 70 10 0 0 0 0 0\n");
        tree.refresh_node(&cpu_path).unwrap();
        assert_eq!(load(&tree), None);
    }

    #[test]
    fn test_missing_value_file_yields_empty_reading() {
        let (mut tree, fs) = open_desktop();
        fs.add_file("/sys/class/hwmon/hwmon3/temp1_input", "not-a-number\n");
        let storage_path = NodePath::root(3);
        tree.refresh_node(&storage_path).unwrap();

        let node = node_at(tree.roots(), &storage_path).unwrap();
        assert_eq!(node.sensors[0].name, "Composite");
        assert_eq!(node.sensors[0].value, None);
    }

    #[test]
    fn test_categories_filter() {
        let fs = MockFs::typical_desktop();
        let cats = Categories::only([HardwareKind::Storage, HardwareKind::Cooler]);
        let tree = HwmonTree::open(fs, "/sys", "/proc", &cats).unwrap();

        let kinds: Vec<HardwareKind> = tree.roots().iter().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            vec![
                HardwareKind::Storage,
                HardwareKind::Storage,
                HardwareKind::Cooler
            ]
        );
    }

    #[test]
    fn test_open_without_hwmon_class_fails() {
        let fs = MockFs::new();
        let result = HwmonTree::open(fs, "/sys", "/proc", &Categories::all());
        assert!(matches!(result, Err(AdapterError::Open { .. })));
    }

    #[test]
    fn test_vanished_chip_fails_refresh() {
        let mut tree =
            HwmonTree::open(MockFs::laptop(), "/sys", "/proc", &Categories::all()).unwrap();
        let storage = tree
            .roots()
            .iter()
            .position(|n| n.kind == HardwareKind::Storage)
            .unwrap();

        // Chip directories gone, e.g. after a driver unbind.
        let empty = MockFs::new();
        empty.add_dir("/sys/class/hwmon");
        tree.fs = empty;
        let result = tree.refresh_node(&NodePath::root(storage));
        assert!(matches!(result, Err(AdapterError::Refresh { .. })));
    }

    #[test]
    fn test_close_clears_forest() {
        let (mut tree, _) = open_desktop();
        tree.close().unwrap();
        assert!(tree.roots().is_empty());
        assert!(matches!(
            tree.refresh_node(&NodePath::root(0)),
            Err(AdapterError::NodeGone(_))
        ));
    }

    #[test]
    fn test_hwmon_index() {
        assert_eq!(hwmon_index(Path::new("/sys/class/hwmon/hwmon12")), Some(12));
        assert_eq!(hwmon_index(Path::new("/sys/class/hwmon/foo")), None);
    }
}
