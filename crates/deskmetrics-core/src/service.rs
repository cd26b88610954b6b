//! The monitor as one owned unit: device hub, assembler and scheduler.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::collector::{FileSystem, HwmonTree};
use crate::config::{ConfigError, MonitorConfig};
use crate::device::{AdapterError, DeviceHub, DeviceTree};
use crate::dump::{DumpError, dump_all};
use crate::scheduler::{CycleOutcome, RefreshScheduler, SchedulerError, SchedulerStats};
use crate::snapshot::{AssembleError, MetricsSnapshot, SnapshotAssembler};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Assemble(#[from] AssembleError),

    #[error(transparent)]
    Dump(#[from] DumpError),
}

pub struct MonitorService {
    hub: Arc<DeviceHub>,
    assembler: SnapshotAssembler,
    scheduler: RefreshScheduler,
    dump_dir: PathBuf,
}

impl MonitorService {
    /// Wraps an already opened device tree.
    pub fn new(tree: Box<dyn DeviceTree>, config: &MonitorConfig) -> Result<Self, ServiceError> {
        config.validate()?;

        let hub = Arc::new(DeviceHub::new(tree));
        let assembler = SnapshotAssembler::new(hub.clone(), config.policy);
        let scheduler = RefreshScheduler::new(Arc::new(assembler.clone()), config.interval);

        Ok(Self {
            hub,
            assembler,
            scheduler,
            dump_dir: config.dump_dir.clone(),
        })
    }

    /// Opens the hwmon adapter on `fs` at the configured roots.
    pub fn open<F: FileSystem + 'static>(
        fs: F,
        config: &MonitorConfig,
    ) -> Result<Self, ServiceError> {
        config.validate()?;
        let tree = HwmonTree::open(fs, &config.sys_root, &config.proc_root, &config.categories)?;
        Self::new(Box::new(tree), config)
    }

    /// Starts periodic refresh on the current tokio runtime.
    pub fn start(&self) -> Result<mpsc::Receiver<CycleOutcome>, ServiceError> {
        Ok(self.scheduler.start()?)
    }

    /// Assembles one snapshot on the calling thread. Blocks on sensor I/O.
    pub fn snapshot_now(&self) -> Result<MetricsSnapshot, ServiceError> {
        Ok(self.assembler.assemble()?)
    }

    /// Writes a raw dump of every node to the dump directory. Blocks on
    /// sensor I/O.
    pub fn dump(&self) -> Result<PathBuf, ServiceError> {
        let mut lease = self.hub.lease()?;
        Ok(dump_all(&mut *lease, &self.dump_dir)?)
    }

    pub fn stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    /// Stops refreshing, waits for the cycle in flight and releases the
    /// adapter. Later calls do nothing and return `Ok(())`.
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        self.scheduler.shutdown().await;
        self.hub.close()?;
        info!("monitor shut down");
        Ok(())
    }
}

impl Drop for MonitorService {
    fn drop(&mut self) {
        self.scheduler.stop();
        if let Err(e) = self.hub.close() {
            warn!(error = %e, "failed to close device tree on drop");
        }
    }
}
