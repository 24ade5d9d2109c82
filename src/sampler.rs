//! Two-snapshot sampling protocol.
//!
//! A [`Sampler`] takes a baseline snapshot, waits for the requested interval
//! and takes a second one. Readers are blocking, so both reads run on tokio's
//! blocking pool and the calling task suspends in the meantime.

use std::hash::Hash;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::collector::{CollectError, SnapshotReader};
use crate::snapshot::Snapshot;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Baseline and current snapshot of one sampling cycle.
#[derive(Debug, Clone)]
pub struct Sample<K, R> {
    baseline: Snapshot<K, R>,
    current: Snapshot<K, R>,
    interval: Duration,
}

impl<K: Eq + Hash, R> Sample<K, R> {
    pub fn baseline(&self) -> &Snapshot<K, R> {
        &self.baseline
    }

    pub fn current(&self) -> &Snapshot<K, R> {
        &self.current
    }

    /// The requested sleep between the reads. The measured interval is
    /// [`elapsed_secs`](Self::elapsed_secs).
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Kernel uptime elapsed between the two reads, in seconds.
    pub fn elapsed_secs(&self) -> f64 {
        self.current.seconds_since(&self.baseline)
    }

    pub fn into_parts(self) -> (Snapshot<K, R>, Snapshot<K, R>) {
        (self.baseline, self.current)
    }
}

/// Drives a [`SnapshotReader`] through baseline and current reads.
pub struct Sampler<R: SnapshotReader> {
    reader: Arc<R>,
}

impl<R: SnapshotReader> Sampler<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: Arc::new(reader),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.reader.kind()
    }

    /// Takes a baseline, sleeps for `interval` and takes the current snapshot.
    ///
    /// Either read failing aborts the sample; nothing is retried.
    pub async fn sample(
        &self,
        interval: Duration,
    ) -> Result<Sample<R::Key, R::Record>, CollectError> {
        let baseline = self.read().await?;
        tokio::time::sleep(interval).await;
        let current = self.read().await?;

        let sample = Sample {
            baseline,
            current,
            interval,
        };
        debug!(
            kind = self.kind(),
            elapsed_secs = sample.elapsed_secs(),
            baseline = sample.baseline.len(),
            current = sample.current.len(),
            "sample taken"
        );
        Ok(sample)
    }

    async fn read(&self) -> Result<Snapshot<R::Key, R::Record>, CollectError> {
        let reader = Arc::clone(&self.reader);
        let t0 = Instant::now();
        let snapshot = tokio::task::spawn_blocking(move || reader.read())
            .await
            .map_err(|e| io::Error::other(format!("snapshot read task failed: {e}")))??;

        trace!(
            kind = self.kind(),
            records = snapshot.len(),
            duration_us = t0.elapsed().as_micros() as u64,
            "snapshot read"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{CpuReader, InterfaceReader, MockFs, ProcessReader, ScriptedFs};

    const SHORT: Duration = Duration::from_millis(5);

    fn scripted() -> ScriptedFs {
        ScriptedFs::new(
            "/proc",
            vec![MockFs::typical_system(), MockFs::typical_system_later()],
        )
    }

    #[tokio::test]
    async fn test_sample_processes() {
        let sampler = Sampler::new(ProcessReader::new(scripted(), "/proc"));
        assert_eq!(sampler.kind(), "processes");

        let sample = sampler.sample(SHORT).await.unwrap();

        assert!((sample.elapsed_secs() - 2.0).abs() < 1e-9);
        assert_eq!(sample.interval(), SHORT);
        assert!(sample.baseline().contains(&1500));
        assert!(!sample.current().contains(&1500));
        assert!(sample.current().contains(&1002));

        let (baseline, current) = sample.into_parts();
        assert_eq!(baseline.len(), 4);
        assert_eq!(current.len(), 4);
    }

    #[tokio::test]
    async fn test_sample_interfaces_and_cpu() {
        let sample = Sampler::new(InterfaceReader::new(scripted(), "/proc"))
            .sample(SHORT)
            .await
            .unwrap();
        assert_eq!(sample.baseline().len(), 4);
        assert_eq!(sample.current().len(), 5);

        let sample = Sampler::new(CpuReader::new(scripted(), "/proc"))
            .sample(SHORT)
            .await
            .unwrap();
        assert_eq!(sample.current().len(), 3);
        assert!(sample.elapsed_secs() > 0.0);
    }

    #[tokio::test]
    async fn test_unchanged_source_gives_zero_elapsed() {
        let sample = Sampler::new(ProcessReader::new(MockFs::typical_system(), "/proc"))
            .sample(SHORT)
            .await
            .unwrap();
        assert_eq!(sample.elapsed_secs(), 0.0);
    }

    #[tokio::test]
    async fn test_read_failure_aborts_sample() {
        let sampler = Sampler::new(ProcessReader::new(MockFs::new(), "/proc"));

        let err = sampler.sample(SHORT).await.unwrap_err();
        assert!(matches!(err, CollectError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_failure_on_second_read() {
        let mut gone = MockFs::typical_system_later();
        gone.remove_file("/proc/net/dev");
        let fs = ScriptedFs::new("/proc", vec![MockFs::typical_system(), gone]);

        let err = Sampler::new(InterfaceReader::new(fs, "/proc"))
            .sample(SHORT)
            .await
            .unwrap_err();
        assert!(matches!(err, CollectError::SourceUnavailable { .. }));
    }
}
