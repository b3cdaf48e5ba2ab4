//! memtrace - runs a scripted lifecycle workload under the tracer.
//!
//! Simulates an instrumented application: the package is created, then
//! each component goes through its lifecycle callbacks while allocating
//! some memory, and the session is stopped. Every callback produces one
//! snapshot in the trace artifact.

use tikv_jemallocator::Jemalloc;

use memtrace::collector::CountingAllocator;

#[global_allocator]
static GLOBAL: CountingAllocator<Jemalloc> = CountingAllocator::new(Jemalloc);

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use memtrace::collector::MetricsSource;
#[cfg(target_os = "linux")]
use memtrace::collector::RealFs;
#[cfg(not(target_os = "linux"))]
use memtrace::collector::mock::MockFs;
use memtrace::collector::ProcfsSource;
use memtrace::config::{OutputFormat, TraceConfig};
use memtrace::storage::model::{MetricKey, SessionResult, parse_key_list};
use memtrace::storage::writer::FileNaming;
use memtrace::{CheckpointDriver, LifecycleEvent, TraceError, Tracer};

/// Checkpoint-driven memory tracer.
#[derive(Parser)]
#[command(name = "memtrace", about = "Checkpoint-driven memory tracer", version)]
struct Args {
    /// Directory for trace artifacts.
    #[arg(short, long, env = "MEMTRACE_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Artifact format.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,

    /// Comma-separated CSV columns (e.g. "label,cpu_time,native_free").
    #[arg(short, long)]
    keys: Option<String>,

    /// Name artifacts memtrace_YYYYMMDD_HHMMSS.<ext> instead of overwriting.
    #[arg(long)]
    timestamped: bool,

    /// Package name used as the session label.
    #[arg(long, default_value = "org.memtrace.demo")]
    package: String,

    /// Number of simulated components.
    #[arg(long, default_value = "2")]
    components: usize,

    /// Pause/resume cycles per component.
    #[arg(long, default_value = "1")]
    cycles: usize,

    /// Path to /proc filesystem (for testing/mocking).
    #[arg(long, default_value = "/proc")]
    proc_path: String,

    /// Log every snapshot.
    #[arg(long)]
    debug: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber with the appropriate log level.
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
    if let Ok(directive) = format!("memtrace={}", level).parse() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Memory a component holds between its create and destroy callbacks.
struct Component {
    name: String,
    buffers: Vec<Vec<u8>>,
}

impl Component {
    fn new(index: usize) -> Self {
        Self {
            name: format!("Screen{}", index + 1),
            buffers: Vec::new(),
        }
    }

    fn allocate(&mut self, kib: usize) {
        self.buffers.push(vec![0xA5; kib * 1024]);
    }

    fn release_half(&mut self) {
        let keep = self.buffers.len() / 2;
        self.buffers.truncate(keep);
    }
}

/// Drives one component through a full lifecycle.
fn run_component<S: MetricsSource>(
    driver: &CheckpointDriver<S>,
    component: &mut Component,
    cycles: usize,
) -> Result<(), TraceError> {
    driver.on_event(&component.name, LifecycleEvent::Create)?;
    component.allocate(256);
    driver.on_event(&component.name, LifecycleEvent::PostCreate)?;
    driver.on_event(&component.name, LifecycleEvent::Start)?;
    driver.on_event(&component.name, LifecycleEvent::Resume)?;

    for _ in 0..cycles {
        component.allocate(512);
        driver.on_event(&component.name, LifecycleEvent::UserLeaving)?;
        driver.on_event(&component.name, LifecycleEvent::Pause)?;
        driver.on_event(&component.name, LifecycleEvent::SaveInstanceState)?;
        driver.on_event(&component.name, LifecycleEvent::Stop)?;
        component.release_half();
        driver.on_event(&component.name, LifecycleEvent::Restart)?;
        driver.on_event(&component.name, LifecycleEvent::Start)?;
        driver.on_event(&component.name, LifecycleEvent::Resume)?;
    }

    driver.on_event(&component.name, LifecycleEvent::Pause)?;
    driver.on_event(&component.name, LifecycleEvent::Stop)?;
    component.buffers.clear();
    driver.on_event(&component.name, LifecycleEvent::Destroy)?;
    Ok(())
}

fn log_summary(result: &SessionResult) {
    info!(
        "Session {} finished: {} snapshots, {} ms total",
        result.label,
        result.snapshots.len(),
        result.total_execution_time()
    );
    if let Some(peak) = result
        .snapshots
        .iter()
        .max_by_key(|s| s.get(MetricKey::ManagedAllocated).unwrap_or(0))
    {
        info!(
            "Peak managed heap: {} kB at {}",
            peak.render(MetricKey::ManagedAllocated),
            peak.label()
        );
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let metric_keys = match args.keys.as_deref() {
        Some(list) => match parse_key_list(list) {
            Ok(keys) => keys,
            Err(e) => {
                error!("{}", e);
                std::process::exit(2);
            }
        },
        None => MetricKey::DEFAULT_CSV_KEYS.to_vec(),
    };

    let config = TraceConfig {
        output_dir: args.output_dir.clone(),
        format: args.format,
        naming: args.timestamped.then_some(FileNaming::Timestamped),
        metric_keys,
        retain_snapshots: true,
    };

    info!("memtrace {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Config: output={}, format={:?}, proc={}",
        config.output_dir.display(),
        config.format,
        args.proc_path
    );

    #[cfg(target_os = "linux")]
    let source = ProcfsSource::new(RealFs::new(), &args.proc_path).with_counter(&GLOBAL);
    #[cfg(not(target_os = "linux"))]
    let source = ProcfsSource::new(MockFs::typical_process(), &args.proc_path).with_counter(&GLOBAL);

    if !source.is_supported() {
        warn!("{}/self is incomplete; snapshots will fail", args.proc_path);
    }

    let tracer = Tracer::new(source).retain_snapshots(config.retain_snapshots);
    tracer.set_writer(Some(config.build_writer()));
    let driver = CheckpointDriver::new(Arc::new(tracer)).with_debug(args.debug);

    // Writer failures are logged by the driver and never end the run.
    if let Err(TraceError::Collect(e)) = driver.on_instrumentation_create(&args.package) {
        error!("Failed to start tracing: {}", e);
        std::process::exit(1);
    }
    if let Err(e) = driver.on_event(&args.package, LifecycleEvent::AppCreate) {
        error!("Snapshot failed: {}", e);
    }

    let mut components: Vec<Component> = (0..args.components).map(Component::new).collect();
    for component in &mut components {
        if let Err(e) = run_component(&driver, component, args.cycles) {
            error!("Component {} aborted: {}", component.name, e);
        }
    }

    match driver.on_instrumentation_destroy() {
        Ok(Some(result)) => log_summary(&result),
        Ok(None) => warn!("Tracer was not running at shutdown"),
        Err(e) => {
            error!("Failed to stop tracing: {}", e);
            std::process::exit(1);
        }
    }
}
