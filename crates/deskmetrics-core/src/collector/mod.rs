//! Hardware sensor collection for Linux.
//!
//! The [`HwmonTree`] adapter turns the sysfs hwmon class into a
//! [`DeviceTree`](crate::device::DeviceTree). All file access goes through
//! the [`FileSystem`] trait, so the adapter runs against an in-memory
//! [`MockFs`] in tests and on non-Linux hosts.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         HwmonTree                           │
//! │  ┌─────────────────────┐   ┌─────────────────────────────┐  │
//! │  │   classify          │   │     parser                  │  │
//! │  │  - driver → kind    │   │  - tempN/fanN/powerN attrs  │  │
//! │  │  - label rewriting  │   │  - /proc/stat, RAPL         │  │
//! │  └──────────┬──────────┘   └──────────────┬──────────────┘  │
//! │             └──────────────┬──────────────┘                 │
//! │                     ┌──────▼──────┐                         │
//! │                     │  FileSystem │ (trait)                 │
//! │                     └──────┬──────┘                         │
//! └────────────────────────────┼────────────────────────────────┘
//!              ┌───────────────┼───────────────┐
//!       ┌──────▼──────┐ ┌──────▼──────┐ ┌──────▼──────┐
//!       │   RealFs    │ │   MockFs    │ │  Scenarios  │
//!       │ (Linux)     │ │ (Testing)   │ │ (Fixtures)  │
//!       └─────────────┘ └─────────────┘ └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use deskmetrics_core::collector::{HwmonTree, MockFs};
//! use deskmetrics_core::device::{Categories, DeviceTree};
//!
//! let fs = MockFs::typical_desktop();
//! let tree = HwmonTree::open(fs, "/sys", "/proc", &Categories::all()).unwrap();
//! assert!(!tree.roots().is_empty());
//! ```

pub mod hwmon;
pub mod mock;
pub mod traits;

pub use hwmon::HwmonTree;
pub use mock::MockFs;
pub use traits::{FileSystem, RealFs};
