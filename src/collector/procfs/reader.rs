//! The reader contract shared by all snapshot kinds.

use std::fmt::Debug;
use std::hash::Hash;
use std::io;
use std::path::{Path, PathBuf};

use super::parser::{ParseError, Uptime, parse_uptime};
use crate::collector::traits::FileSystem;
use crate::snapshot::Snapshot;

/// Error type for collection failures.
#[derive(Debug)]
pub enum CollectError {
    /// A root listing or required file could not be opened.
    SourceUnavailable { path: PathBuf, source: io::Error },
    /// Process disappeared between enumeration and read.
    ProcessGone(u32),
    /// A process record lacks a required structural element.
    Malformed { pid: u32, error: ParseError },
    /// Parse error in a required file.
    Parse(String),
    /// I/O error outside of a specific source file.
    Io(io::Error),
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::SourceUnavailable { path, source } => {
                write!(f, "cannot read {}: {}", path.display(), source)
            }
            CollectError::ProcessGone(pid) => write!(f, "process {} disappeared", pid),
            CollectError::Malformed { pid, error } => {
                write!(f, "malformed record for process {}: {}", pid, error.message)
            }
            CollectError::Parse(msg) => write!(f, "parse error: {}", msg),
            CollectError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for CollectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CollectError::SourceUnavailable { source, .. } => Some(source),
            CollectError::Malformed { error, .. } => Some(error),
            CollectError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CollectError {
    fn from(e: io::Error) -> Self {
        CollectError::Io(e)
    }
}

/// Produces a [`Snapshot`] of every record of one kind at one instant.
///
/// Reads are blocking; the [`Sampler`](crate::sampler::Sampler) runs them on
/// the blocking pool. A reader is not required to support concurrent reads of
/// itself.
pub trait SnapshotReader: Send + Sync + 'static {
    type Key: Eq + Hash + Ord + Clone + Debug + Send + Sync + 'static;
    type Record: Send + Sync + 'static;

    /// Short name of the snapshot kind, used in logs.
    fn kind(&self) -> &'static str;

    fn read(&self) -> Result<Snapshot<Self::Key, Self::Record>, CollectError>;
}

/// Reads a required file, mapping any failure to `SourceUnavailable`.
pub(crate) fn read_source<F: FileSystem>(fs: &F, path: &Path) -> Result<String, CollectError> {
    fs.read_to_string(path)
        .map_err(|source| CollectError::SourceUnavailable {
            path: path.to_path_buf(),
            source,
        })
}

/// Reads `<proc_path>/uptime`, the capture timestamp of every snapshot.
pub(crate) fn read_uptime<F: FileSystem>(fs: &F, proc_path: &str) -> Result<Uptime, CollectError> {
    let path = Path::new(proc_path).join("uptime");
    let content = read_source(fs, &path)?;
    parse_uptime(&content).map_err(|e| CollectError::Parse(e.message))
}
