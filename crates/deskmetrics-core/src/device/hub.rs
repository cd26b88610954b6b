//! Owned handle around the shared device tree.
//!
//! The whole tree is one mutual-exclusion domain: every refresh and read
//! happens while a [`TreeLease`] is held.

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use super::{AdapterError, DeviceTree};

/// Shared owner of a [`DeviceTree`].
///
/// The adapter is released exactly once, by the first successful call to
/// [`DeviceHub::close`]. Leasing after that fails with [`AdapterError::Closed`].
pub struct DeviceHub {
    tree: Mutex<Option<Box<dyn DeviceTree>>>,
}

/// Exclusive access to the device tree for the lifetime of the guard.
pub struct TreeLease<'a> {
    guard: MutexGuard<'a, Option<Box<dyn DeviceTree>>>,
}

impl DeviceHub {
    pub fn new(tree: Box<dyn DeviceTree>) -> Self {
        Self {
            tree: Mutex::new(Some(tree)),
        }
    }

    /// Blocks until the tree is available and returns a lease on it.
    ///
    /// A poisoned lock (a previous holder panicked mid-refresh) is recovered:
    /// readings are replaced on the next refresh anyway.
    pub fn lease(&self) -> Result<TreeLease<'_>, AdapterError> {
        let guard = self.tree.lock().unwrap_or_else(|poisoned| {
            warn!("device tree lock was poisoned, recovering");
            PoisonError::into_inner(poisoned)
        });
        if guard.is_none() {
            return Err(AdapterError::Closed);
        }
        Ok(TreeLease { guard })
    }

    /// Returns `true` once the adapter has been released.
    pub fn is_closed(&self) -> bool {
        self.tree
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Releases the adapter. Subsequent calls are no-ops returning `Ok(())`.
    pub fn close(&self) -> Result<(), AdapterError> {
        let taken = self
            .tree
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match taken {
            Some(mut tree) => {
                tree.close()?;
                info!("device tree closed");
                Ok(())
            }
            None => {
                debug!("device tree already closed");
                Ok(())
            }
        }
    }
}

impl Deref for TreeLease<'_> {
    type Target = dyn DeviceTree;

    fn deref(&self) -> &Self::Target {
        // Constructed only when the slot is occupied; close() needs the same lock.
        match self.guard.as_deref() {
            Some(tree) => tree,
            None => unreachable!("lease outlived the device tree"),
        }
    }
}

impl DerefMut for TreeLease<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self.guard.as_deref_mut() {
            Some(tree) => tree,
            None => unreachable!("lease outlived the device tree"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{HardwareKind, HardwareNode, NodePath, StaticTree};

    fn hub_with_one_cpu() -> (DeviceHub, StaticTree) {
        let tree = StaticTree::new(vec![HardwareNode::new(HardwareKind::Cpu, "cpu")]);
        (DeviceHub::new(Box::new(tree.clone())), tree)
    }

    #[test]
    fn test_lease_gives_access() {
        let (hub, _) = hub_with_one_cpu();
        let mut lease = hub.lease().unwrap();
        assert_eq!(lease.roots().len(), 1);
        lease.refresh_node(&NodePath::root(0)).unwrap();
    }

    #[test]
    fn test_close_is_idempotent() {
        let (hub, tree) = hub_with_one_cpu();
        assert!(!hub.is_closed());

        hub.close().unwrap();
        hub.close().unwrap();

        assert!(hub.is_closed());
        assert_eq!(tree.close_count(), 1);
    }

    #[test]
    fn test_lease_after_close_fails() {
        let (hub, _) = hub_with_one_cpu();
        hub.close().unwrap();
        assert!(matches!(hub.lease(), Err(AdapterError::Closed)));
    }

    #[test]
    fn test_close_error_is_returned_once() {
        let tree = StaticTree::new(Vec::new()).failing_close();
        let hub = DeviceHub::new(Box::new(tree.clone()));

        assert!(matches!(hub.close(), Err(AdapterError::Close(_))));
        // The adapter has been taken out; a second close does not retry.
        hub.close().unwrap();
        assert_eq!(tree.close_count(), 1);
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let (hub, _) = hub_with_one_cpu();
        let hub = std::sync::Arc::new(hub);
        let h = hub.clone();
        let _ = std::thread::spawn(move || {
            let _lease = h.lease().unwrap();
            panic!("boom");
        })
        .join();

        let lease = hub.lease().unwrap();
        assert_eq!(lease.roots().len(), 1);
    }
}
