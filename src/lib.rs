//! procrate - point-in-time utilization rates from Linux kernel counters.
//!
//! Provides:
//! - `collector` - procfs/sysfs readers, record schemas and parsers, filesystem seam
//! - `snapshot` - immutable keyed snapshots stamped with kernel uptime
//! - `rates` - rate derivation from two snapshots of the same kind
//! - `sampler` - async two-snapshot sampling protocol

pub mod collector;
pub mod rates;
pub mod sampler;
pub mod snapshot;
