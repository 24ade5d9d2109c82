//! Mock filesystem that steps through a sequence of states.

use super::filesystem::MockFs;
use crate::collector::traits::FileSystem;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// A sequence of [`MockFs`] stages that advances on every uptime read.
///
/// Every reader reads `<proc>/uptime` before anything else, so the n-th
/// snapshot taken through a `ScriptedFs` sees stage n (the last stage repeats
/// once the script runs out). This lets tests drive a full two-snapshot
/// sample through the real readers.
#[derive(Debug)]
pub struct ScriptedFs {
    stages: Vec<MockFs>,
    uptime_path: PathBuf,
    uptime_reads: AtomicUsize,
    current: AtomicUsize,
}

impl ScriptedFs {
    /// Creates a script over `stages`, advancing on reads of `<proc_path>/uptime`.
    ///
    /// # Panics
    /// Panics if `stages` is empty.
    pub fn new(proc_path: impl AsRef<Path>, stages: Vec<MockFs>) -> Self {
        assert!(!stages.is_empty(), "ScriptedFs needs at least one stage");
        Self {
            stages,
            uptime_path: proc_path.as_ref().join("uptime"),
            uptime_reads: AtomicUsize::new(0),
            current: AtomicUsize::new(0),
        }
    }

    /// Index of the stage currently served.
    pub fn stage(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    fn active(&self) -> &MockFs {
        &self.stages[self.stage()]
    }
}

impl FileSystem for ScriptedFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        if path == self.uptime_path {
            let n = self.uptime_reads.fetch_add(1, Ordering::SeqCst);
            self.current
                .store(n.min(self.stages.len() - 1), Ordering::SeqCst);
        }
        self.active().read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.active().exists(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        self.active().read_dir(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(uptime: &str) -> MockFs {
        let mut fs = MockFs::new();
        fs.add_file("/proc/uptime", uptime);
        fs
    }

    #[test]
    fn test_scripted_fs_advances_on_uptime_read() {
        let fs = ScriptedFs::new("/proc", vec![stage("10.0 1.0"), stage("11.0 1.5")]);
        let uptime = Path::new("/proc/uptime");

        assert_eq!(fs.read_to_string(uptime).unwrap(), "10.0 1.0");
        assert_eq!(fs.stage(), 0);
        assert_eq!(fs.read_to_string(uptime).unwrap(), "11.0 1.5");
        assert_eq!(fs.stage(), 1);
        // Last stage repeats.
        assert_eq!(fs.read_to_string(uptime).unwrap(), "11.0 1.5");
    }

    #[test]
    fn test_scripted_fs_other_reads_do_not_advance() {
        let mut first = stage("10.0 1.0");
        first.add_file("/proc/stat", "cpu 1 2 3 4");
        let fs = ScriptedFs::new("/proc", vec![first, stage("11.0 1.5")]);

        fs.read_to_string(Path::new("/proc/uptime")).unwrap();
        assert!(fs.read_to_string(Path::new("/proc/stat")).is_ok());
        assert!(fs.read_to_string(Path::new("/proc/stat")).is_ok());
        assert_eq!(fs.stage(), 0);
    }
}
