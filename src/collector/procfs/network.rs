//! Interface reader for per-interface byte counters from `/proc/net/dev`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use super::parser::{RawRecord, parse_net_dev_line};
use super::reader::{CollectError, SnapshotReader, read_source, read_uptime};
use crate::collector::traits::FileSystem;
use crate::snapshot::Snapshot;

/// Kind of network device, resolved from sysfs markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceCategory {
    Physical,
    Bridge,
    Tunnel,
    Virtual,
}

impl InterfaceCategory {
    pub fn label(self) -> &'static str {
        match self {
            InterfaceCategory::Physical => "physical",
            InterfaceCategory::Bridge => "bridge",
            InterfaceCategory::Tunnel => "tunnel",
            InterfaceCategory::Virtual => "virtual",
        }
    }
}

impl std::fmt::Display for InterfaceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Where a classification marker lives under the sysfs root.
#[derive(Debug, Clone, Copy)]
enum Marker {
    /// `class/net/<iface>/<attr>`
    ClassAttr(&'static str),
    /// `devices/virtual/net/<iface>`
    VirtualDevice,
}

impl Marker {
    fn path(self, sys_path: &Path, iface: &str) -> PathBuf {
        match self {
            Marker::ClassAttr(attr) => sys_path.join("class/net").join(iface).join(attr),
            Marker::VirtualDevice => sys_path.join("devices/virtual/net").join(iface),
        }
    }
}

/// Evaluated in order, first match wins. Bridges and bridge ports are also
/// virtual devices, so bridge markers come first.
const CLASSIFICATION_RULES: &[(Marker, InterfaceCategory)] = &[
    (Marker::ClassAttr("bridge"), InterfaceCategory::Bridge),
    (Marker::ClassAttr("brport"), InterfaceCategory::Bridge),
    (Marker::ClassAttr("tun_flags"), InterfaceCategory::Tunnel),
    (Marker::VirtualDevice, InterfaceCategory::Virtual),
];

/// Classifies an interface by checking sysfs markers.
///
/// A missing marker is the normal case; interfaces matching no rule are
/// physical.
pub fn classify<F: FileSystem>(fs: &F, sys_path: &Path, iface: &str) -> InterfaceCategory {
    CLASSIFICATION_RULES
        .iter()
        .find(|(marker, _)| fs.exists(&marker.path(sys_path, iface)))
        .map(|&(_, category)| category)
        .unwrap_or(InterfaceCategory::Physical)
}

/// One network interface as seen in a single snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfaceRecord {
    pub name: String,
    pub rx_bytes: u64,
    pub rx_packets: u64,
    pub rx_errs: u64,
    pub rx_drop: u64,
    pub tx_bytes: u64,
    pub tx_packets: u64,
    pub tx_errs: u64,
    pub tx_drop: u64,
    pub category: InterfaceCategory,
    pub raw: RawRecord,
}

impl InterfaceRecord {
    pub fn from_raw(raw: RawRecord, category: InterfaceCategory) -> Self {
        Self {
            name: raw.text("name").to_string(),
            rx_bytes: raw.u64("rx_bytes"),
            rx_packets: raw.u64("rx_packets"),
            rx_errs: raw.u64("rx_errs"),
            rx_drop: raw.u64("rx_drop"),
            tx_bytes: raw.u64("tx_bytes"),
            tx_packets: raw.u64("tx_packets"),
            tx_errs: raw.u64("tx_errs"),
            tx_drop: raw.u64("tx_drop"),
            category,
            raw,
        }
    }
}

/// Reads the interface table from `/proc/net/dev`.
pub struct InterfaceReader<F: FileSystem> {
    fs: F,
    proc_path: String,
    sys_path: PathBuf,
}

impl<F: FileSystem> InterfaceReader<F> {
    const DEFAULT_SYS_PATH: &'static str = "/sys";

    /// Creates a new interface reader.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `proc_path` - Base path to proc filesystem (usually "/proc")
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
            sys_path: PathBuf::from(Self::DEFAULT_SYS_PATH),
        }
    }

    /// Overrides the sysfs root used for classification.
    pub fn with_sys_path(mut self, sys_path: impl Into<PathBuf>) -> Self {
        self.sys_path = sys_path.into();
        self
    }

    /// Reads every interface line of `net/dev`.
    ///
    /// Header lines and lines without a usable name or enough counters are
    /// skipped.
    pub fn read_all(&self) -> Result<Snapshot<String, InterfaceRecord>, CollectError> {
        let uptime = read_uptime(&self.fs, &self.proc_path)?;
        let path = Path::new(&self.proc_path).join("net/dev");
        let content = read_source(&self.fs, &path)?;

        let mut records = HashMap::new();
        for line in content.lines() {
            let Some(raw) = parse_net_dev_line(line) else {
                if !line.contains('|') && !line.trim().is_empty() {
                    debug!(line, "skipping malformed net/dev line");
                }
                continue;
            };
            let category = classify(&self.fs, &self.sys_path, raw.text("name"));
            let record = InterfaceRecord::from_raw(raw, category);
            records.insert(record.name.clone(), record);
        }

        Ok(Snapshot::new(uptime, records))
    }
}

impl<F: FileSystem + 'static> SnapshotReader for InterfaceReader<F> {
    type Key = String;
    type Record = InterfaceRecord;

    fn kind(&self) -> &'static str {
        "interfaces"
    }

    fn read(&self) -> Result<Snapshot<String, InterfaceRecord>, CollectError> {
        self.read_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;

    #[test]
    fn test_read_interfaces() {
        let reader = InterfaceReader::new(MockFs::typical_system(), "/proc");
        let snapshot = reader.read().unwrap();

        assert_eq!(snapshot.len(), 4);

        let lo = snapshot.get(&"lo".to_string()).unwrap();
        assert_eq!(lo.rx_bytes, 12345678);
        assert_eq!(lo.rx_packets, 9876);
        assert_eq!(lo.tx_bytes, 12345678);

        let eth0 = snapshot.get(&"eth0".to_string()).unwrap();
        assert_eq!(eth0.rx_bytes, 987654321);
        assert_eq!(eth0.rx_errs, 5);
        assert_eq!(eth0.rx_drop, 10);
        assert_eq!(eth0.tx_bytes, 123456789);
        assert_eq!(eth0.tx_packets, 456789);
        assert_eq!(eth0.tx_drop, 5);
    }

    #[test]
    fn test_classification() {
        let reader = InterfaceReader::new(MockFs::typical_system_later(), "/proc");
        let snapshot = reader.read().unwrap();

        let category = |name: &str| snapshot.get(&name.to_string()).unwrap().category;
        assert_eq!(category("lo"), InterfaceCategory::Virtual);
        assert_eq!(category("eth0"), InterfaceCategory::Physical);
        assert_eq!(category("docker0"), InterfaceCategory::Bridge);
        assert_eq!(category("veth9a"), InterfaceCategory::Bridge);
        assert_eq!(category("tun0"), InterfaceCategory::Tunnel);
    }

    #[test]
    fn test_classification_order() {
        let mut fs = MockFs::new();
        // A tunnel enslaved to a bridge counts as bridge.
        fs.add_net_marker("tap0", "tun_flags");
        fs.add_net_marker("tap0", "brport");
        fs.add_virtual_net("tap0");

        assert_eq!(
            classify(&fs, Path::new("/sys"), "tap0"),
            InterfaceCategory::Bridge
        );
        assert_eq!(
            classify(&fs, Path::new("/sys"), "enp3s0"),
            InterfaceCategory::Physical
        );
    }

    #[test]
    fn test_custom_sys_path() {
        let mut fs = MockFs::typical_system();
        fs.add_dir("/host/sys/devices/virtual/net/eth0");

        let reader = InterfaceReader::new(fs, "/proc").with_sys_path("/host/sys");
        let snapshot = reader.read().unwrap();

        assert_eq!(
            snapshot.get(&"eth0".to_string()).unwrap().category,
            InterfaceCategory::Virtual
        );
        assert_eq!(
            snapshot.get(&"docker0".to_string()).unwrap().category,
            InterfaceCategory::Physical
        );
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/uptime", "10.0 10.0\n");
        fs.add_file(
            "/proc/net/dev",
            "\
Inter-|   Receive                            |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
  eth0: 1 2 3
      : 1 0 0 0 0 0 0 0 1 0 0 0 0 0 0 0

  eth1: 100 1 0 0 0 0 0 0 200 2 0 0 0 0 0 0
",
        );

        let snapshot = InterfaceReader::new(fs, "/proc").read().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get(&"eth1".to_string()).unwrap().tx_bytes, 200);
    }

    #[test]
    fn test_missing_net_dev() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/uptime", "10.0 10.0\n");

        let err = InterfaceReader::new(fs, "/proc").read().unwrap_err();
        assert!(matches!(err, CollectError::SourceUnavailable { .. }));
    }
}
