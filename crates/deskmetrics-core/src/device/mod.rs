//! Hardware device tree model and the adapter capability.
//!
//! A [`DeviceTree`] exposes a forest of [`HardwareNode`]s. Each node owns an
//! ordered list of [`SensorReading`]s and an ordered list of child nodes
//! (sub-devices such as the individual chips behind a board or a GPU).
//!
//! Readings are only meaningful right after [`DeviceTree::refresh_node`] has
//! been called for their owning node; a refresh replaces the node's readings
//! wholesale.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                  DeviceHub                   │
//! │   Mutex<Option<Box<dyn DeviceTree>>>         │
//! │        │ lease()                             │
//! │   ┌────▼─────┐                               │
//! │   │TreeLease │ (single mutual-exclusion      │
//! │   └────┬─────┘  domain for the whole tree)   │
//! └────────┼─────────────────────────────────────┘
//!          │
//!    ┌─────┴───────────────┐
//!    │                     │
//! ┌──▼────────┐     ┌──────▼─────┐
//! │ HwmonTree │     │ StaticTree │
//! │ (sysfs)   │     │ (in-memory)│
//! └───────────┘     └────────────┘
//! ```

mod hub;
mod static_tree;

pub use hub::{DeviceHub, TreeLease};
pub use static_tree::StaticTree;

use std::fmt;

use serde::Serialize;

/// Category of a physical or logical device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum HardwareKind {
    Cpu,
    Gpu,
    Motherboard,
    Storage,
    Memory,
    Controller,
    Network,
    Psu,
    Cooler,
}

impl HardwareKind {
    /// All known kinds, in display order.
    pub const ALL: [HardwareKind; 9] = [
        HardwareKind::Cpu,
        HardwareKind::Gpu,
        HardwareKind::Motherboard,
        HardwareKind::Storage,
        HardwareKind::Memory,
        HardwareKind::Controller,
        HardwareKind::Network,
        HardwareKind::Psu,
        HardwareKind::Cooler,
    ];

    /// Short lowercase name, used on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            HardwareKind::Cpu => "cpu",
            HardwareKind::Gpu => "gpu",
            HardwareKind::Motherboard => "motherboard",
            HardwareKind::Storage => "storage",
            HardwareKind::Memory => "memory",
            HardwareKind::Controller => "controller",
            HardwareKind::Network => "network",
            HardwareKind::Psu => "psu",
            HardwareKind::Cooler => "cooler",
        }
    }

    /// Parses a name produced by [`HardwareKind::as_str`] (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for HardwareKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HardwareKind::Cpu => "Cpu",
            HardwareKind::Gpu => "Gpu",
            HardwareKind::Motherboard => "Motherboard",
            HardwareKind::Storage => "Storage",
            HardwareKind::Memory => "Memory",
            HardwareKind::Controller => "Controller",
            HardwareKind::Network => "Network",
            HardwareKind::Psu => "Psu",
            HardwareKind::Cooler => "Cooler",
        };
        f.write_str(name)
    }
}

/// Semantic kind of a sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SensorKind {
    /// Degrees Celsius.
    Temperature,
    /// Watts.
    Power,
    /// Percent.
    Load,
    /// Revolutions per minute.
    Fan,
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SensorKind::Temperature => "Temperature",
            SensorKind::Power => "Power",
            SensorKind::Load => "Load",
            SensorKind::Fan => "Fan",
        };
        f.write_str(name)
    }
}

/// One raw sensor value as exposed by the adapter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    pub kind: SensorKind,
    /// Free-text label assigned by the adapter (e.g. "CPU Package", "Tctl").
    pub name: String,
    pub value: Option<f32>,
}

impl SensorReading {
    pub fn new(kind: SensorKind, name: impl Into<String>, value: Option<f32>) -> Self {
        Self {
            kind,
            name: name.into(),
            value,
        }
    }

    pub fn temperature(name: impl Into<String>, value: f32) -> Self {
        Self::new(SensorKind::Temperature, name, Some(value))
    }

    pub fn power(name: impl Into<String>, value: f32) -> Self {
        Self::new(SensorKind::Power, name, Some(value))
    }

    pub fn load(name: impl Into<String>, value: f32) -> Self {
        Self::new(SensorKind::Load, name, Some(value))
    }

    pub fn fan(name: impl Into<String>, value: f32) -> Self {
        Self::new(SensorKind::Fan, name, Some(value))
    }

    /// The numeric value, treating NaN as absent.
    pub fn numeric(&self) -> Option<f32> {
        self.value.filter(|v| !v.is_nan())
    }
}

/// A device in the tree. Owned by the adapter, read-only to everything else.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HardwareNode {
    pub kind: HardwareKind,
    /// Human readable device name.
    pub name: String,
    /// Adapter-specific stable identifier (e.g. a sysfs path).
    pub identifier: String,
    pub sensors: Vec<SensorReading>,
    pub children: Vec<HardwareNode>,
}

impl HardwareNode {
    pub fn new(kind: HardwareKind, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind,
            identifier: format!("/{}/{}", kind.as_str(), name),
            name,
            sensors: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    pub fn with_sensor(mut self, reading: SensorReading) -> Self {
        self.sensors.push(reading);
        self
    }

    pub fn with_child(mut self, child: HardwareNode) -> Self {
        self.children.push(child);
        self
    }

    /// Total number of nodes in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(HardwareNode::subtree_len).sum::<usize>()
    }
}

/// Position of a node in the forest: index among roots, then child indices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    pub fn root(index: usize) -> Self {
        Self(vec![index])
    }

    pub fn child(&self, index: usize) -> Self {
        let mut path = self.0.clone();
        path.push(index);
        Self(path)
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    /// Nesting depth; roots are at depth 0.
    pub fn depth(&self) -> usize {
        self.0.len().saturating_sub(1)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|i| i.to_string()).collect();
        write!(f, "/{}", parts.join("/"))
    }
}

/// Looks up the node at `path` within `roots`.
pub fn node_at<'a>(roots: &'a [HardwareNode], path: &NodePath) -> Option<&'a HardwareNode> {
    let (first, rest) = path.indices().split_first()?;
    let mut node = roots.get(*first)?;
    for &index in rest {
        node = node.children.get(index)?;
    }
    Some(node)
}

/// Mutable variant of [`node_at`].
pub fn node_at_mut<'a>(
    roots: &'a mut [HardwareNode],
    path: &NodePath,
) -> Option<&'a mut HardwareNode> {
    let (first, rest) = path.indices().split_first()?;
    let mut node = roots.get_mut(*first)?;
    for &index in rest {
        node = node.children.get_mut(index)?;
    }
    Some(node)
}

/// Set of enabled device categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Categories {
    enabled: Vec<HardwareKind>,
}

impl Categories {
    /// Every category enabled.
    pub fn all() -> Self {
        Self {
            enabled: HardwareKind::ALL.to_vec(),
        }
    }

    pub fn only(kinds: impl IntoIterator<Item = HardwareKind>) -> Self {
        let mut enabled: Vec<HardwareKind> = kinds.into_iter().collect();
        enabled.sort();
        enabled.dedup();
        Self { enabled }
    }

    /// Parses a comma-separated list such as `"cpu,gpu,storage"`.
    pub fn parse(s: &str) -> Result<Self, String> {
        let mut kinds = Vec::new();
        for part in s.split(',').filter(|p| !p.trim().is_empty()) {
            let kind = HardwareKind::parse(part)
                .ok_or_else(|| format!("unknown device category '{}'", part.trim()))?;
            kinds.push(kind);
        }
        if kinds.is_empty() {
            return Err("empty category list".to_string());
        }
        Ok(Self::only(kinds))
    }

    pub fn contains(&self, kind: HardwareKind) -> bool {
        self.enabled.contains(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = HardwareKind> + '_ {
        self.enabled.iter().copied()
    }
}

impl Default for Categories {
    fn default() -> Self {
        Self::all()
    }
}

/// Errors raised by a device tree adapter.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The adapter could not be opened.
    #[error("failed to open device tree at {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },

    /// Reading a node's sensors failed.
    #[error("failed to refresh {node}: {detail}")]
    Refresh { node: String, detail: String },

    /// The path no longer designates a node.
    #[error("no device at {0}")]
    NodeGone(NodePath),

    /// The adapter has already been released.
    #[error("device tree is closed")]
    Closed,

    /// Releasing the adapter failed.
    #[error("failed to close device tree: {0}")]
    Close(String),
}

/// The hardware-access capability consumed by the resolver.
///
/// Implementations own the forest and mutate readings in place on refresh.
/// Callers serialize all access through a [`DeviceHub`].
pub trait DeviceTree: Send {
    /// Top-level nodes, in adapter order.
    fn roots(&self) -> &[HardwareNode];

    /// Re-reads the sensors of the single node at `path` (not its children).
    fn refresh_node(&mut self, path: &NodePath) -> Result<(), AdapterError>;

    /// Releases the underlying hardware access. Called at most once by the hub.
    fn close(&mut self) -> Result<(), AdapterError> {
        Ok(())
    }
}

/// Refreshes the node at `path` and then, depth-first, every node below it.
pub fn refresh_subtree(tree: &mut dyn DeviceTree, path: &NodePath) -> Result<(), AdapterError> {
    tree.refresh_node(path)?;
    let child_count = node_at(tree.roots(), path)
        .map(|node| node.children.len())
        .ok_or_else(|| AdapterError::NodeGone(path.clone()))?;
    for index in 0..child_count {
        refresh_subtree(tree, &path.child(index))?;
    }
    Ok(())
}

/// Paths of all root nodes of the given kind, in adapter order.
pub fn roots_of_kind(roots: &[HardwareNode], kind: HardwareKind) -> Vec<NodePath> {
    roots
        .iter()
        .enumerate()
        .filter(|(_, node)| node.kind == kind)
        .map(|(index, _)| NodePath::root(index))
        .collect()
}

/// Readings of `kind` under `node`: own readings first, then each child's
/// subtree in child order.
pub fn collect_readings<'a>(node: &'a HardwareNode, kind: SensorKind) -> Vec<&'a SensorReading> {
    let mut out = Vec::new();
    push_readings(node, kind, &mut out);
    out
}

fn push_readings<'a>(node: &'a HardwareNode, kind: SensorKind, out: &mut Vec<&'a SensorReading>) {
    out.extend(node.sensors.iter().filter(|s| s.kind == kind));
    for child in &node.children {
        push_readings(child, kind, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_forest() -> Vec<HardwareNode> {
        vec![
            HardwareNode::new(HardwareKind::Cpu, "cpu")
                .with_sensor(SensorReading::temperature("Package", 50.0))
                .with_child(
                    HardwareNode::new(HardwareKind::Cpu, "ccd0")
                        .with_sensor(SensorReading::temperature("Tccd1", 48.0))
                        .with_child(
                            HardwareNode::new(HardwareKind::Cpu, "deep")
                                .with_sensor(SensorReading::temperature("Deep", 40.0)),
                        ),
                )
                .with_child(
                    HardwareNode::new(HardwareKind::Cpu, "ccd1")
                        .with_sensor(SensorReading::power("Ignored", 10.0))
                        .with_sensor(SensorReading::temperature("Tccd2", 47.0)),
                ),
            HardwareNode::new(HardwareKind::Storage, "nvme0"),
            HardwareNode::new(HardwareKind::Storage, "nvme1"),
        ]
    }

    #[test]
    fn test_node_at() {
        let forest = sample_forest();
        assert_eq!(node_at(&forest, &NodePath::root(0)).unwrap().name, "cpu");
        assert_eq!(
            node_at(&forest, &NodePath::root(0).child(0).child(0))
                .unwrap()
                .name,
            "deep"
        );
        assert!(node_at(&forest, &NodePath::root(5)).is_none());
        assert!(node_at(&forest, &NodePath::root(0).child(7)).is_none());
        assert!(node_at(&forest, &NodePath::default()).is_none());
    }

    #[test]
    fn test_collect_readings_order() {
        let forest = sample_forest();
        let names: Vec<&str> = collect_readings(&forest[0], SensorKind::Temperature)
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["Package", "Tccd1", "Deep", "Tccd2"]);
    }

    #[test]
    fn test_roots_of_kind() {
        let forest = sample_forest();
        let paths = roots_of_kind(&forest, HardwareKind::Storage);
        assert_eq!(paths, vec![NodePath::root(1), NodePath::root(2)]);
        assert!(roots_of_kind(&forest, HardwareKind::Cooler).is_empty());
    }

    #[test]
    fn test_subtree_len() {
        let forest = sample_forest();
        assert_eq!(forest[0].subtree_len(), 4);
        assert_eq!(forest[1].subtree_len(), 1);
    }

    #[test]
    fn test_categories_parse() {
        let cats = Categories::parse("cpu, GPU,storage").unwrap();
        assert!(cats.contains(HardwareKind::Cpu));
        assert!(cats.contains(HardwareKind::Gpu));
        assert!(cats.contains(HardwareKind::Storage));
        assert!(!cats.contains(HardwareKind::Cooler));

        assert!(Categories::parse("cpu,toaster").is_err());
        assert!(Categories::parse(" , ").is_err());
        assert_eq!(Categories::default(), Categories::all());
    }

    #[test]
    fn test_node_path_display() {
        let path = NodePath::root(2).child(0).child(3);
        assert_eq!(path.to_string(), "/2/0/3");
        assert_eq!(path.depth(), 2);
        assert_eq!(NodePath::root(0).depth(), 0);
    }

    #[test]
    fn test_numeric_treats_nan_as_absent() {
        let r = SensorReading::new(SensorKind::Temperature, "x", Some(f32::NAN));
        assert_eq!(r.numeric(), None);
        let r = SensorReading::temperature("x", 42.0);
        assert_eq!(r.numeric(), Some(42.0));
    }
}
