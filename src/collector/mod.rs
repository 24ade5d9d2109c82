//! Counter readers for the Linux `/proc` and `/sys` filesystems.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      SnapshotReader (trait)                  │
//! │  ┌────────────────┐ ┌──────────────────┐ ┌────────────────┐  │
//! │  │ ProcessReader  │ │ InterfaceReader  │ │   CpuReader    │  │
//! │  │ /proc/[pid]/*  │ │ /proc/net/dev    │ │ /proc/stat     │  │
//! │  │                │ │ /sys/class/net/* │ │                │  │
//! │  └───────┬────────┘ └────────┬─────────┘ └───────┬────────┘  │
//! │          └───────────────────┼───────────────────┘           │
//! │                       ┌──────▼──────┐                        │
//! │                       │  FileSystem │ (trait)                │
//! │                       └──────┬──────┘                        │
//! └──────────────────────────────┼───────────────────────────────┘
//!                 ┌──────────────┼──────────────┐
//!          ┌──────▼──────┐ ┌─────▼──────┐ ┌─────▼──────┐
//!          │   RealFs    │ │   MockFs   │ │ ScriptedFs │
//!          │  (Linux)    │ │ (Testing)  │ │ (Testing)  │
//!          └─────────────┘ └────────────┘ └────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use procrate::collector::{MockFs, ProcessReader, SnapshotReader};
//!
//! let reader = ProcessReader::new(MockFs::typical_system(), "/proc");
//! let snapshot = reader.read().unwrap();
//! assert_eq!(snapshot.len(), 4);
//! ```

mod host;
pub mod mock;
pub mod procfs;
pub mod traits;

pub use host::HostParams;
pub use mock::{MockFs, ScriptedFs};
pub use procfs::{
    CollectError, CpuReader, InterfaceReader, ProcessReader, SnapshotReader,
};
pub use traits::{FileSystem, RealFs};
