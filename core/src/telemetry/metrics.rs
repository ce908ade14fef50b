use serde::{Deserialize, Serialize};
use std::sync::Mutex;

pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

/// Counters accumulated over a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub snapshots: usize,
    pub filtered: usize,
    pub failed_records: usize,
    /// Zero-norm calibration angles excluded, summed over batches.
    pub degenerate_angles: usize,
    pub fixes: usize,
    pub failed_windows: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    pub fn record_batch(&self, snapshots: usize, filtered: usize, failed: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.snapshots += snapshots;
            metrics.filtered += filtered;
            metrics.failed_records += failed;
        }
    }

    pub fn record_degenerate(&self, angles: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.degenerate_angles += angles;
        }
    }

    pub fn record_fix(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.fixes += 1;
        }
    }

    pub fn record_failed_window(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.failed_windows += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            *metrics
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = MetricsRecorder::new();
        metrics.record_batch(3, 1, 0);
        metrics.record_batch(2, 0, 1);
        metrics.record_degenerate(2);
        metrics.record_fix();
        metrics.record_failed_window();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.snapshots, 5);
        assert_eq!(snapshot.filtered, 1);
        assert_eq!(snapshot.failed_records, 1);
        assert_eq!(snapshot.degenerate_angles, 2);
        assert_eq!(snapshot.fixes, 1);
        assert_eq!(snapshot.failed_windows, 1);
    }
}
