//! Periodic, single-flight snapshot refresh.
//!
//! A timer task ticks at a fixed interval. Each tick tries to acquire a
//! non-blocking gate; when a previous cycle still holds it the tick is
//! skipped, never queued. An acquired tick spawns a cycle task that runs the
//! blocking assembly on tokio's blocking pool and sends the outcome to the
//! consumer over a bounded channel.
//!
//! ```text
//!  interval ──tick──▶ SingleFlight::try_acquire ──None──▶ skipped
//!                              │ Some(permit)
//!                              ▼
//!                     spawn_blocking(assemble)
//!                              │
//!               ┌──────────────┴──────────────┐
//!         Snapshot / Failed               stopped?
//!               │                             │
//!          mpsc::Sender                   discarded
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::snapshot::{AssembleError, MetricsSnapshot, SnapshotAssembler};

/// Capacity of the outcome channel. Outcomes are dropped, not queued
/// further, when the consumer falls this far behind.
const OUTCOME_BUFFER: usize = 4;

/// Anything that can produce a snapshot on a blocking thread.
pub trait SnapshotSource: Send + Sync + 'static {
    fn assemble(&self) -> Result<MetricsSnapshot, AssembleError>;
}

impl SnapshotSource for SnapshotAssembler {
    fn assemble(&self) -> Result<MetricsSnapshot, AssembleError> {
        SnapshotAssembler::assemble(self)
    }
}

/// Why a cycle produced no snapshot.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("assembly failed: {0}")]
    Assemble(#[from] AssembleError),

    #[error("assembly panicked: {0}")]
    Panicked(String),
}

/// What the consumer receives once per completed cycle.
#[derive(Debug)]
pub enum CycleOutcome {
    Snapshot(MetricsSnapshot),
    Failed(CycleError),
}

/// What the scheduler is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for the next tick, or not started yet.
    Idle,
    /// A cycle is assembling.
    Running,
    /// Stopped for good.
    Stopped,
}

/// Timer lifecycle, guarded by `Shared::lifecycle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    NotStarted,
    Started,
    Stopped,
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("scheduler already running")]
    AlreadyRunning,

    #[error("scheduler has been stopped")]
    Stopped,

    #[error("no tokio runtime available: {0}")]
    NoRuntime(String),
}

/// Counters since start, readable at any time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub skipped: u64,
    pub completed: u64,
    pub failed: u64,
    /// Results of cycles that finished after `stop()`.
    pub discarded: u64,
    /// Outcomes dropped because the consumer's channel was full.
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct StatsCounters {
    ticks: AtomicU64,
    skipped: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    discarded: AtomicU64,
    dropped: AtomicU64,
}

impl StatsCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> SchedulerStats {
        SchedulerStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Non-blocking mutual exclusion for cycles.
#[derive(Debug, Clone, Default)]
pub struct SingleFlight {
    busy: Arc<AtomicBool>,
}

/// Proof of holding the [`SingleFlight`] gate; released on drop.
#[derive(Debug)]
pub struct FlightPermit {
    busy: Arc<AtomicBool>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the gate, or returns `None` immediately if it is held.
    pub fn try_acquire(&self) -> Option<FlightPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightPermit {
                busy: self.busy.clone(),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for FlightPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

struct Shared {
    lifecycle: Mutex<Lifecycle>,
    gate: SingleFlight,
    stop: Notify,
    in_flight: Mutex<Option<JoinHandle<()>>>,
    stats: StatsCounters,
}

impl Shared {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> SchedulerState {
        match *self.lifecycle() {
            Lifecycle::Stopped => SchedulerState::Stopped,
            _ if self.gate.is_busy() => SchedulerState::Running,
            _ => SchedulerState::Idle,
        }
    }

    fn is_stopped(&self) -> bool {
        *self.lifecycle() == Lifecycle::Stopped
    }
}

/// Drives periodic snapshot assembly; see the module docs.
pub struct RefreshScheduler {
    source: Arc<dyn SnapshotSource>,
    interval: Duration,
    shared: Arc<Shared>,
    tick_task: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshScheduler {
    pub fn new(source: Arc<dyn SnapshotSource>, interval: Duration) -> Self {
        Self {
            source,
            interval,
            shared: Arc::new(Shared {
                lifecycle: Mutex::new(Lifecycle::NotStarted),
                gate: SingleFlight::new(),
                stop: Notify::new(),
                in_flight: Mutex::new(None),
                stats: StatsCounters::default(),
            }),
            tick_task: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> SchedulerState {
        self.shared.state()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.shared.stats.snapshot()
    }

    /// Starts ticking on the current tokio runtime and returns the outcome
    /// receiver. The first tick fires immediately.
    pub fn start(&self) -> Result<mpsc::Receiver<CycleOutcome>, SchedulerError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SchedulerError::NoRuntime(e.to_string()))?;

        {
            let mut lifecycle = self.shared.lifecycle();
            match *lifecycle {
                Lifecycle::NotStarted => *lifecycle = Lifecycle::Started,
                Lifecycle::Started => return Err(SchedulerError::AlreadyRunning),
                Lifecycle::Stopped => return Err(SchedulerError::Stopped),
            }
        }

        let (tx, rx) = mpsc::channel(OUTCOME_BUFFER);
        let task = runtime.spawn(tick_loop(
            self.shared.clone(),
            self.source.clone(),
            self.interval,
            tx,
        ));
        *self
            .tick_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(task);

        info!(
            interval_ms = self.interval.as_millis() as u64,
            "refresh scheduler started"
        );
        Ok(rx)
    }

    /// Stops ticking. Terminal: the scheduler cannot be restarted. A cycle
    /// in flight runs to completion but its result is discarded.
    pub fn stop(&self) {
        let mut lifecycle = self.shared.lifecycle();
        if *lifecycle != Lifecycle::Stopped {
            *lifecycle = Lifecycle::Stopped;
            self.shared.stop.notify_one();
            debug!("refresh scheduler stopping");
        }
    }

    /// Stops and waits for the timer task and any in-flight cycle to end.
    /// Safe to call repeatedly.
    pub async fn shutdown(&self) {
        self.stop();

        let tick_task = self
            .tick_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = tick_task
            && let Err(e) = task.await
        {
            warn!(error = %e, "tick task ended abnormally");
        }

        let in_flight = self
            .shared
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = in_flight {
            debug!("waiting for in-flight cycle");
            if let Err(e) = task.await {
                warn!(error = %e, "in-flight cycle ended abnormally");
            }
        }

        let stats = self.stats();
        info!(
            ticks = stats.ticks,
            completed = stats.completed,
            failed = stats.failed,
            skipped = stats.skipped,
            "refresh scheduler stopped"
        );
    }
}

async fn tick_loop(
    shared: Arc<Shared>,
    source: Arc<dyn SnapshotSource>,
    interval: Duration,
    tx: mpsc::Sender<CycleOutcome>,
) {
    let mut tick = tokio::time::interval(interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = shared.stop.notified() => break,
        }
        if shared.is_stopped() {
            break;
        }
        StatsCounters::bump(&shared.stats.ticks);

        let Some(permit) = shared.gate.try_acquire() else {
            StatsCounters::bump(&shared.stats.skipped);
            debug!("previous cycle still running, tick skipped");
            continue;
        };

        let task = tokio::spawn(run_cycle(
            permit,
            shared.clone(),
            source.clone(),
            interval,
            tx.clone(),
        ));
        *shared
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(task);
    }
}

async fn run_cycle(
    permit: FlightPermit,
    shared: Arc<Shared>,
    source: Arc<dyn SnapshotSource>,
    interval: Duration,
    tx: mpsc::Sender<CycleOutcome>,
) {
    // Held until this task ends, however it ends.
    let _permit = permit;

    let t0 = Instant::now();
    let result = tokio::task::spawn_blocking(move || source.assemble()).await;
    let elapsed = t0.elapsed();

    let outcome = match result {
        Ok(Ok(snapshot)) => {
            StatsCounters::bump(&shared.stats.completed);
            debug!(
                duration_ms = elapsed.as_millis() as u64,
                available = snapshot.available(),
                "cycle completed"
            );
            CycleOutcome::Snapshot(snapshot)
        }
        Ok(Err(e)) => {
            StatsCounters::bump(&shared.stats.failed);
            error!(error = %e, "cycle failed");
            CycleOutcome::Failed(CycleError::Assemble(e))
        }
        Err(e) => {
            StatsCounters::bump(&shared.stats.failed);
            error!(error = %e, "cycle panicked in spawn_blocking");
            CycleOutcome::Failed(CycleError::Panicked(e.to_string()))
        }
    };

    if elapsed > interval / 2 {
        warn!(
            duration_ms = elapsed.as_millis() as u64,
            interval_ms = interval.as_millis() as u64,
            "cycle exceeded 50% of interval"
        );
    }

    // Held across the send so a concurrent stop() either precedes the check
    // or follows the delivery.
    let lifecycle = shared.lifecycle();
    if *lifecycle == Lifecycle::Stopped {
        StatsCounters::bump(&shared.stats.discarded);
        debug!("scheduler stopped, cycle result discarded");
        return;
    }

    match tx.try_send(outcome) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            StatsCounters::bump(&shared.stats.dropped);
            warn!("consumer is lagging, outcome dropped");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("outcome receiver gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::AdapterError;
    use chrono::Utc;
    use std::sync::atomic::AtomicUsize;

    /// Source with scripted behaviour per call (0-based call index).
    struct Scripted {
        calls: AtomicUsize,
        active: AtomicUsize,
        max_active: AtomicUsize,
        finished: AtomicUsize,
        delay: Duration,
        behaviour: fn(usize) -> Result<MetricsSnapshot, AssembleError>,
    }

    impl Scripted {
        fn new(
            delay: Duration,
            behaviour: fn(usize) -> Result<MetricsSnapshot, AssembleError>,
        ) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
                finished: AtomicUsize::new(0),
                delay,
                behaviour,
            })
        }
    }

    impl SnapshotSource for Scripted {
        fn assemble(&self) -> Result<MetricsSnapshot, AssembleError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now_active, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.finished.fetch_add(1, Ordering::SeqCst);
            (self.behaviour)(call)
        }
    }

    fn ok(_: usize) -> Result<MetricsSnapshot, AssembleError> {
        Ok(MetricsSnapshot::empty(Utc::now()))
    }

    #[test]
    fn test_single_flight_gate() {
        let gate = SingleFlight::new();
        let permit = gate.try_acquire().unwrap();
        assert!(gate.is_busy());
        assert!(gate.try_acquire().is_none());
        drop(permit);
        assert!(!gate.is_busy());
        assert!(gate.try_acquire().is_some());
    }

    #[test]
    fn test_start_without_runtime_fails() {
        let scheduler =
            RefreshScheduler::new(Scripted::new(Duration::ZERO, ok), Duration::from_secs(1));
        assert!(matches!(scheduler.start(), Err(SchedulerError::NoRuntime(_))));
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_slow_cycles_never_overlap() {
        let source = Scripted::new(Duration::from_millis(120), ok);
        let scheduler = RefreshScheduler::new(source.clone(), Duration::from_millis(20));
        let mut rx = scheduler.start().unwrap();

        let mut delivered = 0;
        let deadline = tokio::time::sleep(Duration::from_millis(600));
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                outcome = rx.recv() => {
                    assert!(matches!(outcome, Some(CycleOutcome::Snapshot(_))));
                    delivered += 1;
                }
                _ = &mut deadline => break,
            }
        }
        scheduler.shutdown().await;

        assert_eq!(source.max_active.load(Ordering::SeqCst), 1);
        let stats = scheduler.stats();
        assert!(stats.skipped > 0);
        // 600 ms of 120 ms cycles.
        assert!(delivered >= 2, "delivered {delivered}");
        assert!(delivered <= 6, "delivered {delivered}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failed_cycle_keeps_scheduler_running() {
        fn fail_first(call: usize) -> Result<MetricsSnapshot, AssembleError> {
            if call == 0 {
                Err(AssembleError::Device(AdapterError::Closed))
            } else {
                ok(call)
            }
        }
        let scheduler = RefreshScheduler::new(
            Scripted::new(Duration::ZERO, fail_first),
            Duration::from_millis(10),
        );
        let mut rx = scheduler.start().unwrap();

        assert!(matches!(
            rx.recv().await,
            Some(CycleOutcome::Failed(CycleError::Assemble(_)))
        ));
        assert!(matches!(rx.recv().await, Some(CycleOutcome::Snapshot(_))));
        assert_ne!(scheduler.state(), SchedulerState::Stopped);

        scheduler.shutdown().await;
        assert!(scheduler.stats().failed >= 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_cycle_is_reported_and_gate_released() {
        fn panic_first(call: usize) -> Result<MetricsSnapshot, AssembleError> {
            if call == 0 {
                panic!("sensor driver exploded");
            }
            ok(call)
        }
        let scheduler = RefreshScheduler::new(
            Scripted::new(Duration::ZERO, panic_first),
            Duration::from_millis(10),
        );
        let mut rx = scheduler.start().unwrap();

        assert!(matches!(
            rx.recv().await,
            Some(CycleOutcome::Failed(CycleError::Panicked(_)))
        ));
        assert!(matches!(rx.recv().await, Some(CycleOutcome::Snapshot(_))));
        scheduler.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_waits_and_discards_in_flight_result() {
        let source = Scripted::new(Duration::from_millis(200), ok);
        let scheduler = RefreshScheduler::new(source.clone(), Duration::from_secs(10));
        let mut rx = scheduler.start().unwrap();

        // Let the first (immediate) tick start its cycle.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        scheduler.shutdown().await;
        assert_eq!(source.finished.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.stats().discarded, 1);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        // Every sender is gone and nothing was delivered.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_state_follows_the_cycle() {
        let scheduler = RefreshScheduler::new(
            Scripted::new(Duration::from_millis(150), ok),
            Duration::from_secs(10),
        );
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        let mut rx = scheduler.start().unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(scheduler.state(), SchedulerState::Running);

        assert!(matches!(rx.recv().await, Some(CycleOutcome::Snapshot(_))));
        tokio::time::sleep(Duration::from_millis(50)).await;
        // Next tick is seconds away.
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        scheduler.shutdown().await;
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_during_cycle_delivers_nothing() {
        let source = Scripted::new(Duration::from_millis(150), ok);
        let scheduler = RefreshScheduler::new(source.clone(), Duration::from_secs(10));
        let mut rx = scheduler.start().unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.stop();

        // The channel closes once the cycle ends, without an outcome.
        assert!(rx.recv().await.is_none());
        assert_eq!(source.finished.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.stats().discarded, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_is_terminal_and_idempotent() {
        let scheduler =
            RefreshScheduler::new(Scripted::new(Duration::ZERO, ok), Duration::from_millis(50));
        let _rx = scheduler.start().unwrap();
        assert!(matches!(scheduler.start(), Err(SchedulerError::AlreadyRunning)));

        scheduler.shutdown().await;
        scheduler.shutdown().await;
        assert!(matches!(scheduler.start(), Err(SchedulerError::Stopped)));
    }
}
