//! Rate derivation from two snapshots of the same kind.
//!
//! Every entry point takes a baseline and a current snapshot plus the elapsed
//! kernel time between them, and returns a [`RateReport`]: rates for the
//! identifiers present in both snapshots, and the identifiers that appeared
//! or disappeared in between. Nothing is clamped; a process using several
//! cores exceeds 100% and a counter reset yields a negative rate.

use std::collections::BTreeMap;
use std::hash::Hash;

use serde::Serialize;

use crate::collector::procfs::{
    CpuId, CpuRecord, InterfaceCategory, InterfaceRecord, ProcessRecord,
};
use crate::snapshot::Snapshot;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for rate computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateError {
    /// Elapsed time between the snapshots is zero, negative or not finite.
    /// Re-sample with a longer interval.
    DegenerateInterval(f64),
    /// Clock ticks per second must be positive.
    InvalidClockTicks,
}

impl std::fmt::Display for RateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RateError::DegenerateInterval(secs) => {
                write!(f, "sample interval too short: {}s elapsed", secs)
            }
            RateError::InvalidClockTicks => write!(f, "clock ticks per second must be positive"),
        }
    }
}

impl std::error::Error for RateError {}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Rates for identifiers present in both snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateReport<K: Ord, R> {
    pub rates: BTreeMap<K, R>,
    /// Present only in the current snapshot; no baseline, so no rate.
    pub born: Vec<K>,
    /// Present only in the baseline snapshot.
    pub exited: Vec<K>,
}

impl<K: Ord, R> RateReport<K, R> {
    pub fn get(&self, key: &K) -> Option<&R> {
        self.rates.get(key)
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

fn check_interval(elapsed_secs: f64) -> Result<(), RateError> {
    if elapsed_secs.is_finite() && elapsed_secs > 0.0 {
        Ok(())
    } else {
        Err(RateError::DegenerateInterval(elapsed_secs))
    }
}

/// Pairs up records by identifier and applies `rate` to each pair.
///
/// A pair for which `same` is false is a reused identifier: the key is
/// reported as both exited and born, with no rate.
fn reconcile<K, T, R>(
    baseline: &Snapshot<K, T>,
    current: &Snapshot<K, T>,
    same: impl Fn(&T, &T) -> bool,
    mut rate: impl FnMut(&T, &T) -> R,
) -> RateReport<K, R>
where
    K: Eq + Hash + Ord + Clone,
{
    let mut rates = BTreeMap::new();
    let mut born = Vec::new();
    let mut exited = Vec::new();

    for (key, curr) in current.iter() {
        match baseline.get(key) {
            Some(prev) if same(prev, curr) => {
                rates.insert(key.clone(), rate(prev, curr));
            }
            Some(_) => {
                exited.push(key.clone());
                born.push(key.clone());
            }
            None => born.push(key.clone()),
        }
    }

    exited.extend(
        baseline
            .keys()
            .filter(|key| !current.contains(key))
            .cloned(),
    );

    born.sort();
    exited.sort();

    RateReport {
        rates,
        born,
        exited,
    }
}

/// Percentage of `part` over `whole`, zero when `whole` is zero.
fn percent(part: f64, whole: f64) -> f64 {
    if whole == 0.0 { 0.0 } else { 100.0 * part / whole }
}

// ---------------------------------------------------------------------------
// Processes
// ---------------------------------------------------------------------------

/// CPU usage of one process over the sample interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProcessRate {
    /// User seconds consumed, including waited-for children.
    pub user_delta_secs: f64,
    /// System seconds consumed, including waited-for children.
    pub system_delta_secs: f64,
    pub total_delta_secs: f64,
    pub user_percent: f64,
    pub system_percent: f64,
    /// Share of one core; above 100 when several cores were used.
    pub total_percent: f64,
}

/// Computes per-process CPU usage.
///
/// `clock_ticks` is USER_HZ (ticks per second).
pub fn compute_process_rates(
    baseline: &Snapshot<u32, ProcessRecord>,
    current: &Snapshot<u32, ProcessRecord>,
    elapsed_secs: f64,
    clock_ticks: u64,
) -> Result<RateReport<u32, ProcessRate>, RateError> {
    check_interval(elapsed_secs)?;
    if clock_ticks == 0 {
        return Err(RateError::InvalidClockTicks);
    }
    let hz = clock_ticks as f64;

    // A pid recycled between the snapshots has a different start time.
    let same_process =
        |prev: &ProcessRecord, curr: &ProcessRecord| prev.starttime == curr.starttime;

    Ok(reconcile(baseline, current, same_process, |prev, curr| {
        let user = (curr.user_ticks() - prev.user_ticks()) as f64 / hz;
        let system = (curr.system_ticks() - prev.system_ticks()) as f64 / hz;
        let total = user + system;
        ProcessRate {
            user_delta_secs: user,
            system_delta_secs: system,
            total_delta_secs: total,
            user_percent: 100.0 * user / elapsed_secs,
            system_percent: 100.0 * system / elapsed_secs,
            total_percent: 100.0 * total / elapsed_secs,
        }
    }))
}

// ---------------------------------------------------------------------------
// Interfaces
// ---------------------------------------------------------------------------

/// Throughput of one interface over the sample interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InterfaceRate {
    pub category: InterfaceCategory,
    /// Negative after a counter reset or wrap.
    pub rx_delta_bytes: i128,
    pub tx_delta_bytes: i128,
    /// Receive speed in kB/s.
    pub rx_kbps: f64,
    /// Transmit speed in kB/s.
    pub tx_kbps: f64,
}

/// Computes per-interface throughput in kB/s.
pub fn compute_interface_rates(
    baseline: &Snapshot<String, InterfaceRecord>,
    current: &Snapshot<String, InterfaceRecord>,
    elapsed_secs: f64,
) -> Result<RateReport<String, InterfaceRate>, RateError> {
    check_interval(elapsed_secs)?;

    Ok(reconcile(baseline, current, |_, _| true, |prev, curr| {
        let rx = i128::from(curr.rx_bytes) - i128::from(prev.rx_bytes);
        let tx = i128::from(curr.tx_bytes) - i128::from(prev.tx_bytes);
        InterfaceRate {
            category: curr.category,
            rx_delta_bytes: rx,
            tx_delta_bytes: tx,
            rx_kbps: rx as f64 / 1024.0 / elapsed_secs,
            tx_kbps: tx as f64 / 1024.0 / elapsed_secs,
        }
    }))
}

/// Summed throughput of all interfaces in one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CategoryTotals {
    pub interfaces: usize,
    pub rx_kbps: f64,
    pub tx_kbps: f64,
}

/// Sums interface rates per category.
pub fn aggregate_by_category(
    report: &RateReport<String, InterfaceRate>,
) -> BTreeMap<InterfaceCategory, CategoryTotals> {
    let mut totals: BTreeMap<InterfaceCategory, CategoryTotals> = BTreeMap::new();
    for rate in report.rates.values() {
        let entry = totals.entry(rate.category).or_default();
        entry.interfaces += 1;
        entry.rx_kbps += rate.rx_kbps;
        entry.tx_kbps += rate.tx_kbps;
    }
    totals
}

// ---------------------------------------------------------------------------
// CPU cores
// ---------------------------------------------------------------------------

/// Utilization of one cpu line over the sample interval.
///
/// Percentages are shares of the ticks the core accounted in the interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CpuRate {
    /// user + nice
    pub user_percent: f64,
    /// system + irq + softirq
    pub system_percent: f64,
    /// idle + iowait
    pub idle_percent: f64,
    pub steal_percent: f64,
    /// Everything but idle and iowait.
    pub busy_percent: f64,
}

/// Computes per-core utilization from `/proc/stat` counters.
///
/// The tick deltas are self-normalizing; `elapsed_secs` is only validated so
/// that all kinds share the same interval guard.
pub fn compute_cpu_rates(
    baseline: &Snapshot<CpuId, CpuRecord>,
    current: &Snapshot<CpuId, CpuRecord>,
    elapsed_secs: f64,
) -> Result<RateReport<CpuId, CpuRate>, RateError> {
    check_interval(elapsed_secs)?;

    Ok(reconcile(baseline, current, |_, _| true, |prev, curr| {
        // Sums of at most eight u64 counters fit in i128.
        let delta = |c: u128, p: u128| (c as i128 - p as i128) as f64;
        let sum = |counters: &[u64]| counters.iter().copied().map(u128::from).sum::<u128>();
        let total = delta(curr.total(), prev.total()).max(0.0);
        let idle = delta(curr.idle_total(), prev.idle_total());
        let user = delta(sum(&[curr.user, curr.nice]), sum(&[prev.user, prev.nice]));
        let system = delta(
            sum(&[curr.system, curr.irq, curr.softirq]),
            sum(&[prev.system, prev.irq, prev.softirq]),
        );
        let steal = delta(u128::from(curr.steal), u128::from(prev.steal));
        CpuRate {
            user_percent: percent(user, total),
            system_percent: percent(system, total),
            idle_percent: percent(idle, total),
            steal_percent: percent(steal, total),
            busy_percent: percent(total - idle, total),
        }
    }))
}
