//! procrate - prints CPU, memory and network rates from two kernel counter
//! snapshots taken an interval apart.

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use procrate::collector::procfs::{CpuId, InterfaceCategory, ProcessRecord};
use procrate::collector::{
    CollectError, CpuReader, HostParams, InterfaceReader, ProcessReader, RealFs,
};
use procrate::rates::{
    CategoryTotals, CpuRate, InterfaceRate, ProcessRate, RateError, aggregate_by_category,
    compute_cpu_rates, compute_interface_rates, compute_process_rates,
};
use procrate::collector::SnapshotReader;
use procrate::sampler::{DEFAULT_INTERVAL, Sample, Sampler};

/// `/proc/uptime` has centisecond resolution; shorter intervals can read
/// the same uptime twice.
const MIN_INTERVAL_MS: u64 = 10;

/// Consecutive zero-length samples tolerated before giving up.
const MAX_RESAMPLES: u32 = 3;

/// Which counters to sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Kind {
    Processes,
    Interfaces,
    Cpu,
    All,
}

impl Kind {
    fn includes(self, other: Kind) -> bool {
        self == Kind::All || self == other
    }
}

/// Point-in-time utilization rates from /proc and /sys counters.
#[derive(Parser)]
#[command(name = "procrate", about = "Utilization rates from kernel counters", version)]
struct Args {
    /// Counters to sample.
    #[arg(short, long, value_enum, default_value = "all")]
    kind: Kind,

    /// Time between the baseline and the current snapshot, in milliseconds.
    /// At least 10, the resolution of /proc/uptime.
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_INTERVAL.as_millis() as u64,
        value_parser = clap::value_parser!(u64).range(MIN_INTERVAL_MS..)
    )]
    interval_ms: u64,

    /// Number of sampling cycles. 0 runs until interrupted.
    #[arg(short, long, default_value = "1")]
    count: u64,

    /// Path to /proc filesystem (for testing/mocking).
    #[arg(long, default_value = "/proc")]
    proc_path: String,

    /// Path to /sys filesystem, used to classify network interfaces.
    #[arg(long, default_value = "/sys")]
    sys_path: String,

    /// Bytes per memory page (`getconf PAGESIZE`).
    #[arg(long, default_value_t = HostParams::DEFAULT_PAGE_SIZE)]
    page_size: u64,

    /// Clock ticks per second (`getconf CLK_TCK`).
    #[arg(long, default_value_t = HostParams::DEFAULT_CLOCK_TICKS)]
    clock_ticks: u64,

    /// Rows shown per table.
    #[arg(short, long, default_value = "10")]
    top: usize,

    /// Print one JSON object per cycle instead of tables.
    #[arg(long)]
    json: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Logs go to stderr so that stdout only carries reports.
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
    if let Ok(directive) = format!("procrate={}", level).parse() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[derive(Debug)]
enum AppError {
    Collect(CollectError),
    Rate(RateError),
    Json(serde_json::Error),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Collect(e) => write!(f, "collection failed: {}", e),
            AppError::Rate(e) => write!(f, "rate computation failed: {}", e),
            AppError::Json(e) => write!(f, "failed to encode report: {}", e),
        }
    }
}

impl std::error::Error for AppError {}

impl From<CollectError> for AppError {
    fn from(e: CollectError) -> Self {
        AppError::Collect(e)
    }
}

impl From<RateError> for AppError {
    fn from(e: RateError) -> Self {
        AppError::Rate(e)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Json(e)
    }
}

// ---------------------------------------------------------------------------
// Report rows
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ProcessRow {
    pid: u32,
    comm: String,
    state: &'static str,
    mem_mb: f64,
    #[serde(flatten)]
    rate: ProcessRate,
}

#[derive(Serialize)]
struct ProcessSection {
    elapsed_secs: f64,
    processes: Vec<ProcessRow>,
    born: Vec<u32>,
    exited: Vec<u32>,
}

#[derive(Serialize)]
struct InterfaceRow {
    name: String,
    #[serde(flatten)]
    rate: InterfaceRate,
}

#[derive(Serialize)]
struct InterfaceSection {
    elapsed_secs: f64,
    interfaces: Vec<InterfaceRow>,
    categories: BTreeMap<InterfaceCategory, CategoryTotals>,
    born: Vec<String>,
    exited: Vec<String>,
}

#[derive(Serialize)]
struct CpuRow {
    cpu: CpuId,
    #[serde(flatten)]
    rate: CpuRate,
}

#[derive(Serialize)]
struct CpuSection {
    elapsed_secs: f64,
    cpus: Vec<CpuRow>,
}

#[derive(Serialize)]
struct CycleReport {
    cycle: u64,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    processes: Option<ProcessSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    interfaces: Option<InterfaceSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cpu: Option<CpuSection>,
}

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

struct Samplers {
    processes: Option<Sampler<ProcessReader<RealFs>>>,
    interfaces: Option<Sampler<InterfaceReader<RealFs>>>,
    cpu: Option<Sampler<CpuReader<RealFs>>>,
}

impl Samplers {
    fn new(args: &Args, host: HostParams) -> Self {
        let fs = RealFs::new();
        Self {
            processes: args.kind.includes(Kind::Processes).then(|| {
                Sampler::new(
                    ProcessReader::new(fs, &args.proc_path).with_page_size(host.page_size),
                )
            }),
            interfaces: args.kind.includes(Kind::Interfaces).then(|| {
                Sampler::new(
                    InterfaceReader::new(fs, &args.proc_path).with_sys_path(&args.sys_path),
                )
            }),
            cpu: args
                .kind
                .includes(Kind::Cpu)
                .then(|| Sampler::new(CpuReader::new(fs, &args.proc_path))),
        }
    }
}

/// Samples and derives rates, re-sampling when the two snapshots landed on
/// the same uptime reading.
async fn sample_rates<R, T>(
    sampler: &Sampler<R>,
    interval: Duration,
    compute: impl Fn(&Sample<R::Key, R::Record>) -> Result<T, RateError>,
) -> Result<(Sample<R::Key, R::Record>, T), AppError>
where
    R: SnapshotReader,
{
    let mut attempt = 0;
    loop {
        let sample = sampler.sample(interval).await?;
        match compute(&sample) {
            Ok(report) => return Ok((sample, report)),
            Err(RateError::DegenerateInterval(secs)) if attempt < MAX_RESAMPLES => {
                attempt += 1;
                warn!(
                    kind = sampler.kind(),
                    elapsed_secs = secs,
                    attempt,
                    "sample interval too short, re-sampling"
                );
            }
            Err(e) => return Err(e.into()),
        }
    }
}

async fn sample_processes(
    sampler: Option<&Sampler<ProcessReader<RealFs>>>,
    interval: Duration,
    host: HostParams,
    top: usize,
) -> Result<Option<ProcessSection>, AppError> {
    let Some(sampler) = sampler else {
        return Ok(None);
    };
    let (sample, report) = sample_rates(sampler, interval, |sample| {
        compute_process_rates(
            sample.baseline(),
            sample.current(),
            sample.elapsed_secs(),
            host.clock_ticks,
        )
    })
    .await?;
    let elapsed_secs = sample.elapsed_secs();

    let mut processes: Vec<ProcessRow> = report
        .rates
        .iter()
        .filter_map(|(pid, rate)| {
            let record: &ProcessRecord = sample.current().get(pid)?;
            Some(ProcessRow {
                pid: *pid,
                comm: record.comm.clone(),
                state: record.state.label(),
                mem_mb: record.mem_mb,
                rate: *rate,
            })
        })
        .collect();
    processes.sort_by(|a, b| {
        b.rate
            .total_percent
            .total_cmp(&a.rate.total_percent)
            .then(a.pid.cmp(&b.pid))
    });
    processes.truncate(top);

    Ok(Some(ProcessSection {
        elapsed_secs,
        processes,
        born: report.born,
        exited: report.exited,
    }))
}

async fn sample_interfaces(
    sampler: Option<&Sampler<InterfaceReader<RealFs>>>,
    interval: Duration,
    top: usize,
) -> Result<Option<InterfaceSection>, AppError> {
    let Some(sampler) = sampler else {
        return Ok(None);
    };
    let (sample, report) = sample_rates(sampler, interval, |sample| {
        compute_interface_rates(sample.baseline(), sample.current(), sample.elapsed_secs())
    })
    .await?;
    let elapsed_secs = sample.elapsed_secs();
    let categories = aggregate_by_category(&report);

    let mut interfaces: Vec<InterfaceRow> = report
        .rates
        .iter()
        .map(|(name, rate)| InterfaceRow {
            name: name.clone(),
            rate: *rate,
        })
        .collect();
    let throughput = |row: &InterfaceRow| row.rate.rx_kbps + row.rate.tx_kbps;
    interfaces.sort_by(|a, b| throughput(b).total_cmp(&throughput(a)).then(a.name.cmp(&b.name)));
    interfaces.truncate(top);

    Ok(Some(InterfaceSection {
        elapsed_secs,
        interfaces,
        categories,
        born: report.born,
        exited: report.exited,
    }))
}

async fn sample_cpu(
    sampler: Option<&Sampler<CpuReader<RealFs>>>,
    interval: Duration,
) -> Result<Option<CpuSection>, AppError> {
    let Some(sampler) = sampler else {
        return Ok(None);
    };
    let (sample, report) = sample_rates(sampler, interval, |sample| {
        compute_cpu_rates(sample.baseline(), sample.current(), sample.elapsed_secs())
    })
    .await?;
    let elapsed_secs = sample.elapsed_secs();

    let cpus = report
        .rates
        .into_iter()
        .map(|(cpu, rate)| CpuRow { cpu, rate })
        .collect();

    Ok(Some(CpuSection { elapsed_secs, cpus }))
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_tables(report: &CycleReport) {
    println!("# cycle {} at {}", report.cycle, report.timestamp);

    if let Some(section) = &report.processes {
        println!();
        println!(
            "{:>8} {:<16} {:<10} {:>8} {:>8} {:>8} {:>10}",
            "PID", "COMM", "STATE", "USR%", "SYS%", "CPU%", "MEM(MB)"
        );
        for row in &section.processes {
            println!(
                "{:>8} {:<16} {:<10} {:>8.1} {:>8.1} {:>8.1} {:>10.1}",
                row.pid,
                truncate(&row.comm, 16),
                row.state,
                row.rate.user_percent,
                row.rate.system_percent,
                row.rate.total_percent,
                row.mem_mb
            );
        }
        println!(
            "({} new, {} exited over {:.2}s)",
            section.born.len(),
            section.exited.len(),
            section.elapsed_secs
        );
    }

    if let Some(section) = &report.interfaces {
        println!();
        println!(
            "{:<16} {:<10} {:>12} {:>12}",
            "IFACE", "CATEGORY", "RX(kB/s)", "TX(kB/s)"
        );
        for row in &section.interfaces {
            println!(
                "{:<16} {:<10} {:>12.2} {:>12.2}",
                truncate(&row.name, 16),
                row.rate.category,
                row.rate.rx_kbps,
                row.rate.tx_kbps
            );
        }
        for (category, totals) in &section.categories {
            println!(
                "{:<16} {:<10} {:>12.2} {:>12.2}",
                format!("[{} total]", totals.interfaces),
                category,
                totals.rx_kbps,
                totals.tx_kbps
            );
        }
    }

    if let Some(section) = &report.cpu {
        println!();
        println!(
            "{:<8} {:>8} {:>8} {:>8} {:>8} {:>8}",
            "CPU", "USR%", "SYS%", "IDLE%", "STEAL%", "BUSY%"
        );
        for row in &section.cpus {
            println!(
                "{:<8} {:>8.1} {:>8.1} {:>8.1} {:>8.1} {:>8.1}",
                row.cpu.to_string(),
                row.rate.user_percent,
                row.rate.system_percent,
                row.rate.idle_percent,
                row.rate.steal_percent,
                row.rate.busy_percent
            );
        }
    }
    println!();
}

fn truncate(s: &str, width: usize) -> String {
    s.chars().take(width).collect()
}

// ---------------------------------------------------------------------------
// Main loop
// ---------------------------------------------------------------------------

async fn run(args: Args, running: Arc<AtomicBool>) -> Result<(), AppError> {
    let host = HostParams::new(args.page_size, args.clock_ticks);
    let interval = Duration::from_millis(args.interval_ms);
    let samplers = Samplers::new(&args, host);

    let mut cycle: u64 = 0;
    while running.load(Ordering::SeqCst) && (args.count == 0 || cycle < args.count) {
        cycle += 1;

        let (processes, interfaces, cpu) = tokio::try_join!(
            sample_processes(samplers.processes.as_ref(), interval, host, args.top),
            sample_interfaces(samplers.interfaces.as_ref(), interval, args.top),
            sample_cpu(samplers.cpu.as_ref(), interval),
        )?;

        let report = CycleReport {
            cycle,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            processes,
            interfaces,
            cpu,
        };

        if args.json {
            println!("{}", serde_json::to_string(&report)?);
        } else {
            print_tables(&report);
        }
        debug!(cycle, "cycle complete");
    }

    info!(cycles = cycle, "sampling finished");
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    info!("procrate {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Config: kind={:?}, interval={}ms, proc={}, sys={}, page_size={}, clock_ticks={}",
        args.kind, args.interval_ms, args.proc_path, args.sys_path, args.page_size, args.clock_ticks
    );

    // Setup graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    if let Err(e) = run(args, running).await {
        error!("{}", e);
        std::process::exit(1);
    }
}
