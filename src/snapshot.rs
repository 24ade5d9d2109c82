//! Immutable point-in-time snapshots keyed by entity identifier.

use std::collections::HashMap;
use std::hash::Hash;

use crate::collector::procfs::Uptime;

/// All records of one kind captured by a single reader invocation.
///
/// Stamped with the kernel uptime at capture time rather than wall-clock
/// time, so the interval between two snapshots is immune to clock
/// adjustments. There is no way to mutate a snapshot after construction.
#[derive(Debug, Clone)]
pub struct Snapshot<K, R> {
    records: HashMap<K, R>,
    uptime: Uptime,
}

impl<K: Eq + Hash, R> Snapshot<K, R> {
    pub fn new(uptime: Uptime, records: HashMap<K, R>) -> Self {
        Self { records, uptime }
    }

    pub fn uptime(&self) -> Uptime {
        self.uptime
    }

    pub fn get(&self, key: &K) -> Option<&R> {
        self.records.get(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.records.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.records.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &R)> {
        self.records.iter()
    }

    /// Seconds of kernel uptime between `earlier` and this snapshot.
    ///
    /// Zero or negative when the snapshots were taken out of order or within
    /// the resolution of `/proc/uptime`.
    pub fn seconds_since(&self, earlier: &Self) -> f64 {
        self.uptime.seconds - earlier.uptime.seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(seconds: f64, keys: &[u32]) -> Snapshot<u32, &'static str> {
        let records = keys.iter().map(|&k| (k, "rec")).collect();
        Snapshot::new(
            Uptime {
                seconds,
                idle_seconds: 0.0,
            },
            records,
        )
    }

    #[test]
    fn test_snapshot_lookup() {
        let snap = at(10.0, &[1, 2, 3]);
        assert_eq!(snap.len(), 3);
        assert!(snap.contains(&2));
        assert!(!snap.contains(&4));
        assert_eq!(snap.get(&1), Some(&"rec"));
        assert!(!snap.is_empty());
    }

    #[test]
    fn test_seconds_since() {
        let a = at(100.25, &[]);
        let b = at(101.75, &[]);
        assert!((b.seconds_since(&a) - 1.5).abs() < 1e-9);
        assert!(a.seconds_since(&b) < 0.0);
        assert_eq!(a.seconds_since(&a), 0.0);
    }
}
