//! Readers for the Linux `/proc` filesystem.
//!
//! `schema` and `parser` turn raw record lines into field maps; the readers
//! enumerate all records of one kind and produce a keyed [`Snapshot`].
//!
//! [`Snapshot`]: crate::snapshot::Snapshot

pub mod cpu;
pub mod network;
pub mod parser;
pub mod process;
mod reader;
pub mod schema;

pub use cpu::{CpuId, CpuReader, CpuRecord};
pub use network::{InterfaceCategory, InterfaceReader, InterfaceRecord};
pub use parser::{FieldValue, ParseError, ProcessState, RawRecord, Uptime};
pub use process::{ProcessReader, ProcessRecord};
pub use reader::{CollectError, SnapshotReader};
