//! deskmetricsd - hardware telemetry monitor.
//!
//! Resolves CPU, GPU, board, storage and cooling metrics from the Linux hwmon
//! class once per interval and prints one line per snapshot to stdout.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio::sync::Notify;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(target_os = "linux")]
use deskmetrics_core::collector::RealFs;
#[cfg(not(target_os = "linux"))]
use deskmetrics_core::collector::mock::MockFs;
use deskmetrics_core::config::default_dump_dir;
use deskmetrics_core::device::Categories;
use deskmetrics_core::fmt::format_snapshot_line;
use deskmetrics_core::{
    CycleError, CycleOutcome, MetricsSnapshot, MonitorConfig, MonitorService, PlausibilityPolicy,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// One human readable line per snapshot.
    Text,
    /// One JSON object per snapshot.
    Json,
}

/// Hardware telemetry monitor.
#[derive(Parser, Debug)]
#[command(name = "deskmetricsd", about = "Hardware telemetry monitor", version)]
struct Args {
    /// Refresh interval (e.g. "1s", "500ms", "2"). Plain numbers are seconds.
    #[arg(short, long, default_value = "1s", value_parser = parse_interval, env = "DESKMETRICS_INTERVAL")]
    interval: Duration,

    /// Path to sysfs (for testing/mocking).
    #[arg(long, default_value = "/sys", env = "DESKMETRICS_SYS_PATH")]
    sys_path: PathBuf,

    /// Path to procfs (for testing/mocking).
    #[arg(long, default_value = "/proc", env = "DESKMETRICS_PROC_PATH")]
    proc_path: PathBuf,

    /// Directory for sensor dumps. Defaults to <local data dir>/deskmetrics.
    #[arg(long, env = "DESKMETRICS_DUMP_DIR")]
    dump_dir: Option<PathBuf>,

    /// Temperatures at or below this value (°C) are treated as sensor noise.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true, env = "DESKMETRICS_TEMP_MIN")]
    temp_min: f32,

    /// Temperatures at or above this value (°C) are treated as sensor noise.
    #[arg(long, default_value_t = 120.0, env = "DESKMETRICS_TEMP_MAX")]
    temp_max: f32,

    /// Comma-separated device categories to monitor (e.g. "cpu,gpu,storage").
    /// All categories by default.
    #[arg(long, value_parser = Categories::parse, env = "DESKMETRICS_CATEGORIES")]
    categories: Option<Categories>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Print a single snapshot and exit.
    #[arg(long)]
    once: bool,

    /// Write a raw dump of every sensor, print its path and exit.
    #[arg(long, conflicts_with = "once")]
    dump: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn to_config(&self) -> MonitorConfig {
        MonitorConfig {
            interval: self.interval,
            policy: PlausibilityPolicy::new(self.temp_min, self.temp_max),
            sys_root: self.sys_path.clone(),
            proc_root: self.proc_path.clone(),
            categories: self.categories.clone().unwrap_or_default(),
            dump_dir: self.dump_dir.clone().unwrap_or_else(default_dump_dir),
        }
    }
}

/// Parses an interval such as "1s", "250ms" or "2" (seconds).
fn parse_interval(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty interval".to_string());
    }

    let (num_str, millis) = if let Some(num) = s.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = s.strip_suffix('s') {
        (num, false)
    } else {
        (s, false)
    };

    let n = num_str
        .trim()
        .parse::<u64>()
        .map_err(|e| format!("invalid interval '{}': {}", s, e))?;
    let interval = if millis {
        Duration::from_millis(n)
    } else {
        Duration::from_secs(n)
    };
    if interval.is_zero() {
        return Err("interval must be greater than zero".to_string());
    }
    Ok(interval)
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["deskmetricsd", "deskmetrics_core"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn render_snapshot(snapshot: &MetricsSnapshot, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_snapshot_line(snapshot),
        OutputFormat::Json => serde_json::to_string(snapshot)
            .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string()),
    }
}

fn render_failure(error: &CycleError, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!(
            "{}  cycle failed: {}",
            chrono::Local::now().format("%H:%M:%S"),
            error
        ),
        OutputFormat::Json => serde_json::json!({
            "captured_at": chrono::Utc::now().to_rfc3339(),
            "error": error.to_string(),
        })
        .to_string(),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    let config = args.to_config();
    info!("deskmetricsd {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Config: interval={}ms, sys={}, proc={}, dump_dir={}",
        config.interval.as_millis(),
        config.sys_root.display(),
        config.proc_root.display(),
        config.dump_dir.display()
    );

    #[cfg(target_os = "linux")]
    let fs = RealFs::new();
    #[cfg(not(target_os = "linux"))]
    let fs = {
        warn!("hwmon is only available on Linux, using simulated desktop sensors");
        MockFs::typical_desktop()
    };

    let service = match MonitorService::open(fs, &config) {
        Ok(service) => service,
        Err(e) => {
            error!(error = %e, "failed to open hardware monitor");
            return ExitCode::FAILURE;
        }
    };

    if args.dump {
        return match service.dump() {
            Ok(path) => {
                println!("{}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %e, "sensor dump failed");
                ExitCode::FAILURE
            }
        };
    }

    if args.once {
        return match service.snapshot_now() {
            Ok(snapshot) => {
                println!("{}", render_snapshot(&snapshot, args.format));
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %e, "failed to collect snapshot");
                ExitCode::FAILURE
            }
        };
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run(service, args.format))
}

async fn run(service: MonitorService, format: OutputFormat) -> ExitCode {
    // Setup graceful shutdown
    let shutdown = Arc::new(Notify::new());
    let s = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        s.notify_one();
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    let mut outcomes = match service.start() {
        Ok(rx) => rx,
        Err(e) => {
            error!(error = %e, "failed to start refresh scheduler");
            return ExitCode::FAILURE;
        }
    };

    info!("Starting refresh loop");

    loop {
        tokio::select! {
            outcome = outcomes.recv() => match outcome {
                Some(CycleOutcome::Snapshot(snapshot)) => {
                    println!("{}", render_snapshot(&snapshot, format));
                }
                Some(CycleOutcome::Failed(e)) => {
                    println!("{}", render_failure(&e, format));
                }
                None => break,
            },
            _ = shutdown.notified() => break,
        }
    }

    info!("Shutting down...");
    let code = match service.shutdown().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "shutdown failed");
            ExitCode::FAILURE
        }
    };

    let stats = service.stats();
    info!(
        ticks = stats.ticks,
        completed = stats.completed,
        failed = stats.failed,
        skipped = stats.skipped,
        dropped = stats.dropped,
        "Shutdown complete"
    );
    code
}
