use crate::math::stats::StatsHelper;
use std::sync::Mutex;
use std::time::Duration;

/// Counters kept by a sensor interface across ticks.
pub struct MetricsRecorder {
    inner: Mutex<Metrics>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub bytes_read: usize,
    pub frames_decoded: usize,
    pub incomplete_polls: usize,
    pub overflows: usize,
    pub decode_errors: usize,
    /// Framed packets dropped because their elements overran the packet.
    pub abandoned_packets: usize,
}

#[derive(Default)]
struct Metrics {
    counters: MetricsSnapshot,
    frame_timings: Vec<f64>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Metrics::default()),
        }
    }

    pub fn record_bytes(&self, count: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.counters.bytes_read += count;
        }
    }

    /// Records a decoded frame together with the time spent producing it.
    pub fn record_frame(&self, elapsed: Duration) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.counters.frames_decoded += 1;
            metrics.frame_timings.push(elapsed.as_secs_f64());
        }
    }

    pub fn record_incomplete(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.counters.incomplete_polls += 1;
        }
    }

    pub fn record_overflow(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.counters.overflows += 1;
        }
    }

    pub fn record_abandoned(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.counters.abandoned_packets += 1;
        }
    }

    pub fn record_decode_error(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.counters.decode_errors += 1;
        }
    }

    /// Frames per second implied by the mean per-frame processing time.
    pub fn frame_rate(&self) -> Option<f64> {
        let metrics = self.inner.lock().ok()?;
        StatsHelper::mean(&metrics.frame_timings)
            .filter(|mean| *mean > 0.0)
            .map(|mean| 1.0 / mean)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            metrics.counters.clone()
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
