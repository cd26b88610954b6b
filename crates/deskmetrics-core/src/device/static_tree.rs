//! In-memory device tree for tests and fixtures.
//!
//! Readings change only through queued refresh frames, so tests can tell a
//! value read before a refresh from one read after it.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::{AdapterError, DeviceTree, HardwareKind, HardwareNode, NodePath, SensorReading};
use super::{node_at, node_at_mut};

#[derive(Debug, Default)]
struct TreeStats {
    refreshes: Mutex<HashMap<NodePath, usize>>,
    closes: AtomicUsize,
}

/// A [`DeviceTree`] over an owned forest.
///
/// Clones share their refresh/close counters, so a test can keep one clone
/// for inspection and hand the other to a [`DeviceHub`](super::DeviceHub).
#[derive(Debug, Clone, Default)]
pub struct StaticTree {
    roots: Vec<HardwareNode>,
    frames: HashMap<NodePath, VecDeque<Vec<SensorReading>>>,
    failing: Vec<HardwareKind>,
    fail_close: bool,
    refresh_delay: Option<Duration>,
    stats: Arc<TreeStats>,
}

impl StaticTree {
    pub fn new(roots: Vec<HardwareNode>) -> Self {
        Self {
            roots,
            ..Self::default()
        }
    }

    /// Queues reading sets for the node at `path`; each refresh of that node
    /// pops the next set and replaces the node's readings with it. Once the
    /// queue is empty, refreshes keep the current readings.
    pub fn with_frames(mut self, path: NodePath, frames: Vec<Vec<SensorReading>>) -> Self {
        self.frames.entry(path).or_default().extend(frames);
        self
    }

    /// Makes every refresh of a node of `kind` fail.
    pub fn failing_on(mut self, kind: HardwareKind) -> Self {
        self.failing.push(kind);
        self
    }

    /// Makes [`DeviceTree::close`] fail.
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Sleeps for `delay` on every node refresh, simulating slow hardware.
    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = Some(delay);
        self
    }

    /// Number of refreshes performed on the node at `path`.
    pub fn refresh_count(&self, path: &NodePath) -> usize {
        self.stats
            .refreshes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    /// Number of refreshes performed on any node.
    pub fn total_refreshes(&self) -> usize {
        self.stats
            .refreshes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .sum()
    }

    /// Number of times the adapter was closed.
    pub fn close_count(&self) -> usize {
        self.stats.closes.load(Ordering::SeqCst)
    }
}

impl DeviceTree for StaticTree {
    fn roots(&self) -> &[HardwareNode] {
        &self.roots
    }

    fn refresh_node(&mut self, path: &NodePath) -> Result<(), AdapterError> {
        let node = node_at(&self.roots, path).ok_or_else(|| AdapterError::NodeGone(path.clone()))?;

        *self
            .stats
            .refreshes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(path.clone())
            .or_default() += 1;

        if let Some(delay) = self.refresh_delay {
            std::thread::sleep(delay);
        }

        if self.failing.contains(&node.kind) {
            return Err(AdapterError::Refresh {
                node: node.name.clone(),
                detail: "injected failure".to_string(),
            });
        }

        let next = self.frames.get_mut(path).and_then(VecDeque::pop_front);
        if let Some(readings) = next
            && let Some(node) = node_at_mut(&mut self.roots, path)
        {
            node.sensors = readings;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), AdapterError> {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(AdapterError::Close("injected failure".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_replace_readings_wholesale() {
        let mut tree = StaticTree::new(vec![
            HardwareNode::new(HardwareKind::Gpu, "gpu")
                .with_sensor(SensorReading::temperature("Edge", 30.0))
                .with_sensor(SensorReading::power("Board", 10.0)),
        ])
        .with_frames(
            NodePath::root(0),
            vec![vec![SensorReading::temperature("Edge", 55.0)]],
        );

        tree.refresh_node(&NodePath::root(0)).unwrap();
        let sensors = &tree.roots()[0].sensors;
        assert_eq!(sensors.len(), 1);
        assert_eq!(sensors[0].value, Some(55.0));

        // Queue drained: readings stay as they are.
        tree.refresh_node(&NodePath::root(0)).unwrap();
        assert_eq!(tree.roots()[0].sensors[0].value, Some(55.0));
        assert_eq!(tree.refresh_count(&NodePath::root(0)), 2);
    }

    #[test]
    fn test_failing_kind() {
        let mut tree = StaticTree::new(vec![
            HardwareNode::new(HardwareKind::Cpu, "cpu"),
            HardwareNode::new(HardwareKind::Gpu, "gpu"),
        ])
        .failing_on(HardwareKind::Gpu);

        assert!(tree.refresh_node(&NodePath::root(0)).is_ok());
        assert!(matches!(
            tree.refresh_node(&NodePath::root(1)),
            Err(AdapterError::Refresh { .. })
        ));
    }

    #[test]
    fn test_missing_node() {
        let mut tree = StaticTree::new(Vec::new());
        assert!(matches!(
            tree.refresh_node(&NodePath::root(0)),
            Err(AdapterError::NodeGone(_))
        ));
    }

    #[test]
    fn test_clones_share_counters() {
        let tree = StaticTree::new(vec![HardwareNode::new(HardwareKind::Cpu, "cpu")]);
        let mut other = tree.clone();
        other.refresh_node(&NodePath::root(0)).unwrap();
        other.close().unwrap();
        assert_eq!(tree.total_refreshes(), 1);
        assert_eq!(tree.close_count(), 1);
    }
}
