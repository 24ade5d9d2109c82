//! CPU reader for per-core time counters from `/proc/stat`.

use std::collections::HashMap;
use std::path::Path;

use serde::{Serialize, Serializer};

use super::parser::{RawRecord, parse_cpu_line};
use super::reader::{CollectError, SnapshotReader, read_source, read_uptime};
use crate::collector::traits::FileSystem;
use crate::snapshot::Snapshot;

/// Identifies a `/proc/stat` cpu line: the aggregate `cpu` or a `cpuN` core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CpuId {
    Total,
    Core(u32),
}

impl CpuId {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.strip_prefix("cpu")? {
            "" => Some(CpuId::Total),
            n => n.parse().ok().map(CpuId::Core),
        }
    }
}

impl std::fmt::Display for CpuId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CpuId::Total => f.write_str("cpu"),
            CpuId::Core(n) => write!(f, "cpu{}", n),
        }
    }
}

impl Serialize for CpuId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Cumulative time counters of one cpu line, in clock ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CpuRecord {
    pub id: CpuId,
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
    pub guest: u64,
    pub guest_nice: u64,
}

impl CpuRecord {
    pub fn from_raw(id: CpuId, raw: &RawRecord) -> Self {
        Self {
            id,
            user: raw.u64("user"),
            nice: raw.u64("nice"),
            system: raw.u64("system"),
            idle: raw.u64("idle"),
            iowait: raw.u64("iowait"),
            irq: raw.u64("irq"),
            softirq: raw.u64("softirq"),
            steal: raw.u64("steal"),
            guest: raw.u64("guest"),
            guest_nice: raw.u64("guest_nice"),
        }
    }

    /// All accounted ticks. Guest time is already part of user and nice.
    pub fn total(&self) -> u128 {
        [
            self.user,
            self.nice,
            self.system,
            self.idle,
            self.iowait,
            self.irq,
            self.softirq,
            self.steal,
        ]
        .into_iter()
        .map(u128::from)
        .sum()
    }

    /// Ticks spent idle, including waiting on I/O.
    pub fn idle_total(&self) -> u128 {
        u128::from(self.idle) + u128::from(self.iowait)
    }
}

/// Reads cpu lines from `/proc/stat`.
pub struct CpuReader<F: FileSystem> {
    fs: F,
    proc_path: String,
}

impl<F: FileSystem> CpuReader<F> {
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
        }
    }

    pub fn read_all(&self) -> Result<Snapshot<CpuId, CpuRecord>, CollectError> {
        let uptime = read_uptime(&self.fs, &self.proc_path)?;
        let path = Path::new(&self.proc_path).join("stat");
        let content = read_source(&self.fs, &path)?;

        let records = content
            .lines()
            .filter_map(parse_cpu_line)
            .filter_map(|raw| {
                let id = CpuId::from_label(raw.text("cpu"))?;
                Some((id, CpuRecord::from_raw(id, &raw)))
            })
            .collect::<HashMap<_, _>>();

        if records.is_empty() {
            return Err(CollectError::Parse(format!(
                "no cpu lines in {}",
                path.display()
            )));
        }

        Ok(Snapshot::new(uptime, records))
    }
}

impl<F: FileSystem + 'static> SnapshotReader for CpuReader<F> {
    type Key = CpuId;
    type Record = CpuRecord;

    fn kind(&self) -> &'static str {
        "cpu"
    }

    fn read(&self) -> Result<Snapshot<CpuId, CpuRecord>, CollectError> {
        self.read_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;

    #[test]
    fn test_cpu_id() {
        assert_eq!(CpuId::from_label("cpu"), Some(CpuId::Total));
        assert_eq!(CpuId::from_label("cpu12"), Some(CpuId::Core(12)));
        assert_eq!(CpuId::from_label("cpux"), None);
        assert_eq!(CpuId::from_label("intr"), None);
        assert_eq!(CpuId::Core(3).to_string(), "cpu3");
        assert!(CpuId::Total < CpuId::Core(0));
    }

    #[test]
    fn test_read_cpus() {
        let reader = CpuReader::new(MockFs::typical_system(), "/proc");
        let snapshot = reader.read().unwrap();

        assert_eq!(snapshot.len(), 3);

        let total = snapshot.get(&CpuId::Total).unwrap();
        assert_eq!(total.user, 10000);
        assert_eq!(total.idle, 80000);
        assert_eq!(total.total(), 10000 + 500 + 3000 + 80000 + 1000 + 200 + 100);
        assert_eq!(total.idle_total(), 81000);

        let cpu1 = snapshot.get(&CpuId::Core(1)).unwrap();
        assert_eq!(cpu1.system, 1500);
    }

    #[test]
    fn test_totals_near_counter_limit() {
        let max = u64::MAX;
        let raw = parse_cpu_line(&format!("cpu0 {max} {max} 0 {max} 0 0 0 0 0 0")).unwrap();
        let record = CpuRecord::from_raw(CpuId::Core(0), &raw);

        assert_eq!(record.total(), 3 * u128::from(u64::MAX));
        assert_eq!(record.idle_total(), u128::from(u64::MAX));
    }

    #[test]
    fn test_read_cpus_without_cpu_lines() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/uptime", "10.0 10.0\n");
        fs.add_file("/proc/stat", "ctxt 1\nbtime 2\n");

        let err = CpuReader::new(fs, "/proc").read().unwrap_err();
        assert!(matches!(err, CollectError::Parse(_)));
    }
}
