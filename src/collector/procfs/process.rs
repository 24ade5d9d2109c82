//! Process reader for per-process CPU accounting from `/proc/[pid]/`.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, trace, warn};

use super::parser::{ProcessState, RawRecord, parse_cmdline, parse_stat_line};
use super::reader::{CollectError, SnapshotReader, read_uptime};
use crate::collector::host::HostParams;
use crate::collector::traits::FileSystem;
use crate::snapshot::Snapshot;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One process as seen in a single snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessRecord {
    pub pid: u32,
    /// Executable name from stat, without the enclosing parentheses.
    pub comm: String,
    /// Arguments rejoined with spaces; empty for kernel threads.
    pub cmdline: String,
    pub state: ProcessState,
    pub ppid: u32,
    /// User time in clock ticks.
    pub utime: u64,
    /// System time in clock ticks.
    pub stime: u64,
    /// User time of waited-for children in clock ticks.
    pub cutime: i64,
    /// System time of waited-for children in clock ticks.
    pub cstime: i64,
    pub priority: i64,
    pub nice: i64,
    pub num_threads: u64,
    /// Start time after boot in clock ticks.
    pub starttime: u64,
    /// Virtual memory size in bytes.
    pub vsize: u64,
    /// Resident set size in pages.
    pub rss: i64,
    /// Resident memory in bytes (`rss * page_size`).
    pub mem_bytes: u64,
    /// Resident memory in megabytes.
    pub mem_mb: f64,
    pub raw: RawRecord,
}

impl ProcessRecord {
    /// Builds a typed record from a parsed stat line.
    ///
    /// `pid` comes from the directory name, which is authoritative even when
    /// the stat line is truncated.
    pub fn from_raw(pid: u32, raw: RawRecord, cmdline: String, page_size: u64) -> Self {
        let state = raw
            .text("state")
            .chars()
            .next()
            .map(ProcessState::from_code)
            .unwrap_or(ProcessState::Unknown);
        let rss = raw.i64("rss");
        let mem_bytes = (rss.max(0) as u64).saturating_mul(page_size);

        Self {
            pid,
            comm: raw.text("comm").to_string(),
            cmdline,
            state,
            ppid: u32::try_from(raw.u64("ppid")).unwrap_or(0),
            utime: raw.u64("utime"),
            stime: raw.u64("stime"),
            cutime: raw.i64("cutime"),
            cstime: raw.i64("cstime"),
            priority: raw.i64("priority"),
            nice: raw.i64("nice"),
            num_threads: raw.u64("num_threads"),
            starttime: raw.u64("starttime"),
            vsize: raw.u64("vsize"),
            rss,
            mem_bytes,
            mem_mb: mem_bytes as f64 / BYTES_PER_MB,
            raw,
        }
    }

    /// User ticks of the process and its waited-for children.
    pub fn user_ticks(&self) -> i128 {
        i128::from(self.utime) + i128::from(self.cutime)
    }

    /// System ticks of the process and its waited-for children.
    pub fn system_ticks(&self) -> i128 {
        i128::from(self.stime) + i128::from(self.cstime)
    }
}

/// Reads the process table from `/proc/[pid]/`.
pub struct ProcessReader<F: FileSystem> {
    fs: F,
    proc_path: String,
    page_size: u64,
}

impl<F: FileSystem> ProcessReader<F> {
    /// Creates a new process reader.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `proc_path` - Base path to proc filesystem (usually "/proc")
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
            page_size: HostParams::DEFAULT_PAGE_SIZE,
        }
    }

    /// Sets the page size used to convert resident pages to bytes.
    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Reads a single process.
    ///
    /// A missing or unreadable stat file is reported as `ProcessGone`; a stat
    /// line without the bracketed name as `Malformed`.
    pub fn read_process(&self, pid: u32) -> Result<ProcessRecord, CollectError> {
        let proc_dir = Path::new(&self.proc_path).join(pid.to_string());

        let cmdline = self
            .fs
            .read_to_string(&proc_dir.join("cmdline"))
            .map(|content| parse_cmdline(&content))
            .unwrap_or_default();

        let stat = self
            .fs
            .read_to_string(&proc_dir.join("stat"))
            .map_err(|_| CollectError::ProcessGone(pid))?;
        let raw = parse_stat_line(&stat).map_err(|error| CollectError::Malformed { pid, error })?;

        Ok(ProcessRecord::from_raw(pid, raw, cmdline, self.page_size))
    }

    /// Reads every numeric entry of the proc directory.
    ///
    /// Processes that disappear during the read are skipped silently;
    /// malformed records are skipped with a warning. Failing to list the
    /// proc directory fails the whole read.
    pub fn read_all(&self) -> Result<Snapshot<u32, ProcessRecord>, CollectError> {
        let started = Instant::now();
        let uptime = read_uptime(&self.fs, &self.proc_path)?;

        let proc_path = Path::new(&self.proc_path);
        let entries =
            self.fs
                .read_dir(proc_path)
                .map_err(|source| CollectError::SourceUnavailable {
                    path: proc_path.to_path_buf(),
                    source,
                })?;

        let mut records = HashMap::new();
        for entry in entries {
            let Some(pid) = entry
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.parse::<u32>().ok())
            else {
                continue;
            };

            match self.read_process(pid) {
                Ok(record) => {
                    records.insert(pid, record);
                }
                Err(CollectError::ProcessGone(_)) => {
                    debug!(pid, "process exited during read, skipping");
                }
                Err(e) => {
                    warn!(pid, error = %e, "skipping process");
                }
            }
        }

        trace!(
            processes = records.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "process snapshot read"
        );
        Ok(Snapshot::new(uptime, records))
    }
}

impl<F: FileSystem + 'static> SnapshotReader for ProcessReader<F> {
    type Key = u32;
    type Record = ProcessRecord;

    fn kind(&self) -> &'static str {
        "processes"
    }

    fn read(&self) -> Result<Snapshot<u32, ProcessRecord>, CollectError> {
        self.read_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;

    #[test]
    fn test_read_single_process() {
        let reader = ProcessReader::new(MockFs::typical_system(), "/proc");

        let info = reader.read_process(1001).unwrap();

        assert_eq!(info.pid, 1001);
        assert_eq!(info.ppid, 1);
        assert_eq!(info.comm, "postgres");
        assert_eq!(
            info.cmdline,
            "/usr/lib/postgresql/16/bin/postgres -D /var/lib/postgresql/16/main"
        );
        assert_eq!(info.state, ProcessState::Running);
        assert_eq!(info.utime, 10000);
        assert_eq!(info.stime, 2000);
        assert_eq!(info.user_ticks(), 10000);
        assert_eq!(info.system_ticks(), 2000);
    }

    #[test]
    fn test_child_ticks_included() {
        let reader = ProcessReader::new(MockFs::typical_system(), "/proc");

        let init = reader.read_process(1).unwrap();
        assert_eq!(init.cutime, 2000);
        assert_eq!(init.user_ticks(), 2100);
        assert_eq!(init.system_ticks(), 850);
    }

    #[test]
    fn test_memory_from_page_size() {
        let reader = ProcessReader::new(MockFs::typical_system(), "/proc");
        let info = reader.read_process(1001).unwrap();
        assert_eq!(info.rss, 25600);
        assert_eq!(info.mem_bytes, 104_857_600);
        assert!((info.mem_mb - 100.0).abs() < 1e-9);

        let reader = ProcessReader::new(MockFs::typical_system(), "/proc").with_page_size(16384);
        assert_eq!(reader.page_size(), 16384);
        let info = reader.read_process(1001).unwrap();
        assert!((info.mem_mb - 400.0).abs() < 1e-9);
    }

    #[test]
    fn test_read_process_with_special_name() {
        let reader = ProcessReader::new(MockFs::with_special_names(), "/proc");

        let info = reader.read_process(5000).unwrap();
        assert_eq!(info.comm, "Web Content");
        assert_eq!(info.utime, 5000);
        assert_eq!(info.raw.token_count(), 52);

        let info = reader.read_process(5001).unwrap();
        assert_eq!(info.comm, "test(1)");
        assert_eq!(info.cmdline, "");

        let info = reader.read_process(5002).unwrap();
        assert_eq!(info.comm, ") S 1 (");
        assert_eq!(info.ppid, 1);
    }

    #[test]
    fn test_read_all_processes() {
        let reader = ProcessReader::new(MockFs::typical_system(), "/proc");

        let snapshot = reader.read().unwrap();

        assert_eq!(snapshot.len(), 4);
        for pid in [1, 1000, 1001, 1500] {
            assert!(snapshot.contains(&pid), "missing pid {}", pid);
        }
        assert!((snapshot.uptime().seconds - 12345.67).abs() < 1e-9);
        assert_eq!(reader.kind(), "processes");
    }

    #[test]
    fn test_read_process_gone() {
        let mut fs = MockFs::new();
        fs.add_dir("/proc/9999");

        let reader = ProcessReader::new(fs, "/proc");
        let result = reader.read_process(9999);

        assert!(matches!(result, Err(CollectError::ProcessGone(9999))));
    }

    #[test]
    fn test_read_malformed_process() {
        let mut fs = MockFs::new();
        fs.add_process(77, "77 nameless S 1", "");

        let reader = ProcessReader::new(fs, "/proc");
        let result = reader.read_process(77);

        assert!(matches!(result, Err(CollectError::Malformed { pid: 77, .. })));
    }

    #[test]
    fn test_read_all_skips_unreliable_processes() {
        let reader = ProcessReader::new(MockFs::with_unreliable_processes(), "/proc");

        let snapshot = reader.read().unwrap();

        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains(&1));
        assert!(!snapshot.contains(&6000));
        assert!(!snapshot.contains(&6100));
    }

    #[test]
    fn test_read_zombie_process() {
        let reader = ProcessReader::new(MockFs::with_zombie_process(), "/proc");

        let info = reader.read_process(4000).unwrap();
        assert_eq!(info.state, ProcessState::Zombie);
        assert_eq!(info.state.label(), "zombie");
        assert_eq!(info.mem_bytes, 0);
        assert_eq!(info.cmdline, "");
    }

    #[test]
    fn test_read_missing_proc_root() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/uptime", "1.0 1.0\n");

        let reader = ProcessReader::new(fs, "/other/proc");
        let err = reader.read().unwrap_err();
        assert!(matches!(err, CollectError::SourceUnavailable { .. }));
    }

    #[test]
    fn test_short_stat_is_kept() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/uptime", "1.0 1.0\n");
        let full = MockFs::stat_line(88, "old kernel", 'S', 1, [40, 10, 0, 0], 100);
        let tokens: Vec<&str> = full.split(' ').collect();
        fs.add_process(88, &tokens[..tokens.len() - 8].join(" "), "");

        let snapshot = ProcessReader::new(fs, "/proc").read().unwrap();
        let info = snapshot.get(&88).unwrap();
        assert_eq!(info.comm, "old kernel");
        assert_eq!(info.utime, 40);
        assert_eq!(info.raw.token_count(), 44);
    }
}
