/*!
 * Operation metrics: counters, throughput sampling, size histogram
 *
 * The recorder is owned by the orchestrator and mutated only through its
 * update methods. The lock is never held across I/O; streaming loops fold
 * in-flight bytes through an atomic so the reported percentage stays
 * monotonic while `bytes_copied` only advances at file completion.
 */

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::{LARGE_FILE_THRESHOLD, SMALL_FILE_THRESHOLD};

/// Sliding-window cap for throughput samples
pub const SPEED_SAMPLE_CAP: usize = 600;

/// File-size class used by the histogram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    Small,
    Medium,
    Large,
}

impl SizeClass {
    pub fn classify(bytes: u64) -> Self {
        if bytes < SMALL_FILE_THRESHOLD {
            Self::Small
        } else if bytes < LARGE_FILE_THRESHOLD {
            Self::Medium
        } else {
            Self::Large
        }
    }
}

/// Size-class histogram carried by the aggregate outcome
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SizeHistogram {
    pub small: u64,
    pub medium: u64,
    pub large: u64,
}

#[derive(Debug)]
struct MetricsState {
    total_files: u64,
    total_bytes: u64,
    files_processed: u64,
    bytes_copied: u64,
    histogram: SizeHistogram,
    current_speed_mbps: f64,
    peak_speed_mbps: f64,
    disk_reads_saved: u64,
    speed_samples: Vec<(f64, f64)>,
}

/// Thread-safe metrics recorder shared with streaming loops
#[derive(Clone)]
pub struct MetricsRecorder {
    started: Instant,
    state: Arc<Mutex<MetricsState>>,
    bytes_in_flight: Arc<AtomicU64>,
}

impl MetricsRecorder {
    pub fn new(total_files: u64, total_bytes: u64) -> Self {
        Self {
            started: Instant::now(),
            state: Arc::new(Mutex::new(MetricsState {
                total_files,
                total_bytes,
                files_processed: 0,
                bytes_copied: 0,
                histogram: SizeHistogram::default(),
                current_speed_mbps: 0.0,
                peak_speed_mbps: 0.0,
                disk_reads_saved: 0,
                speed_samples: Vec::new(),
            })),
            bytes_in_flight: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record_size_class(&self, class: SizeClass) {
        let mut state = self.state.lock().unwrap();
        match class {
            SizeClass::Small => state.histogram.small += 1,
            SizeClass::Medium => state.histogram.medium += 1,
            SizeClass::Large => state.histogram.large += 1,
        }
    }

    /// Record an instantaneous throughput sample from a streaming loop
    pub fn record_sample(&self, mbps: f64) {
        let elapsed = self.started.elapsed().as_secs_f64();
        let mut state = self.state.lock().unwrap();
        state.current_speed_mbps = mbps;
        if mbps > state.peak_speed_mbps {
            state.peak_speed_mbps = mbps;
        }
        if state.speed_samples.len() >= SPEED_SAMPLE_CAP {
            state.speed_samples.remove(0);
        }
        state.speed_samples.push((elapsed, mbps));
    }

    /// One destination read eliminated by hashing the source during the write
    pub fn record_read_saved(&self) {
        self.state.lock().unwrap().disk_reads_saved += 1;
    }

    /// Fold streamed-but-uncommitted bytes into the progress percentage
    pub fn add_in_flight(&self, bytes: u64) {
        self.bytes_in_flight.fetch_add(bytes, Ordering::Relaxed);
    }

    /// A file finished (fsync and verification done): commit its bytes and
    /// retire whatever it had folded in-flight
    pub fn complete_file(&self, bytes: u64, in_flight: u64, duration: Duration) {
        self.bytes_in_flight.fetch_sub(in_flight, Ordering::Relaxed);
        let mut state = self.state.lock().unwrap();
        state.bytes_copied += bytes;
        state.files_processed += 1;

        let secs = duration.as_secs_f64();
        if secs > 0.0 {
            let mbps = (bytes as f64 / (1024.0 * 1024.0)) / secs;
            if mbps > state.peak_speed_mbps {
                state.peak_speed_mbps = mbps;
            }
        }
    }

    /// A file aborted mid-stream: retire its in-flight contribution
    pub fn abort_file(&self, in_flight: u64) {
        self.bytes_in_flight.fetch_sub(in_flight, Ordering::Relaxed);
    }

    /// A completed move was undone by rollback
    pub fn rollback_file(&self, bytes: u64) {
        let mut state = self.state.lock().unwrap();
        state.bytes_copied = state.bytes_copied.saturating_sub(bytes);
        state.files_processed = state.files_processed.saturating_sub(1);
    }

    /// Global completion percentage: byte-based when totals are known,
    /// file-count based otherwise
    pub fn overall_percentage(&self) -> u8 {
        let in_flight = self.bytes_in_flight.load(Ordering::Relaxed);
        let state = self.state.lock().unwrap();
        let pct = if state.total_bytes > 0 {
            (state.bytes_copied + in_flight) * 100 / state.total_bytes
        } else if state.total_files > 0 {
            state.files_processed * 100 / state.total_files
        } else {
            0
        };
        pct.min(100) as u8
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let in_flight = self.bytes_in_flight.load(Ordering::Relaxed);
        let elapsed = self.started.elapsed().as_secs_f64();
        let state = self.state.lock().unwrap();

        let avg_speed_mbps = if elapsed > 0.0 {
            (state.bytes_copied as f64 / (1024.0 * 1024.0)) / elapsed
        } else {
            0.0
        };

        MetricsSnapshot {
            total_files: state.total_files,
            total_bytes: state.total_bytes,
            files_processed: state.files_processed,
            bytes_copied: state.bytes_copied,
            bytes_in_flight: in_flight,
            histogram: state.histogram,
            current_speed_mbps: state.current_speed_mbps,
            avg_speed_mbps,
            peak_speed_mbps: state.peak_speed_mbps,
            disk_reads_saved: state.disk_reads_saved,
            elapsed_s: elapsed,
            speed_samples: state.speed_samples.clone(),
        }
    }
}

/// Point-in-time copy of the metrics, handed to callbacks
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_files: u64,
    pub total_bytes: u64,
    pub files_processed: u64,
    pub bytes_copied: u64,
    pub bytes_in_flight: u64,
    pub histogram: SizeHistogram,
    pub current_speed_mbps: f64,
    pub avg_speed_mbps: f64,
    pub peak_speed_mbps: f64,
    pub disk_reads_saved: u64,
    pub elapsed_s: f64,
    pub speed_samples: Vec<(f64, f64)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_classification() {
        assert_eq!(SizeClass::classify(0), SizeClass::Small);
        assert_eq!(
            SizeClass::classify(SMALL_FILE_THRESHOLD - 1),
            SizeClass::Small
        );
        assert_eq!(SizeClass::classify(SMALL_FILE_THRESHOLD), SizeClass::Medium);
        assert_eq!(
            SizeClass::classify(LARGE_FILE_THRESHOLD - 1),
            SizeClass::Medium
        );
        assert_eq!(SizeClass::classify(LARGE_FILE_THRESHOLD), SizeClass::Large);
    }

    #[test]
    fn test_completion_commits_bytes() {
        let recorder = MetricsRecorder::new(2, 200);
        recorder.add_in_flight(50);
        assert_eq!(recorder.snapshot().bytes_copied, 0);
        assert_eq!(recorder.snapshot().bytes_in_flight, 50);

        recorder.complete_file(100, 50, Duration::from_millis(10));
        let snap = recorder.snapshot();
        assert_eq!(snap.bytes_copied, 100);
        assert_eq!(snap.bytes_in_flight, 0);
        assert_eq!(snap.files_processed, 1);
    }

    #[test]
    fn test_abort_retires_in_flight() {
        let recorder = MetricsRecorder::new(1, 100);
        recorder.add_in_flight(60);
        recorder.abort_file(60);
        let snap = recorder.snapshot();
        assert_eq!(snap.bytes_in_flight, 0);
        assert_eq!(snap.bytes_copied, 0);
        assert_eq!(snap.files_processed, 0);
    }

    #[test]
    fn test_percentage_monotonic_across_completion() {
        let recorder = MetricsRecorder::new(1, 100);
        recorder.add_in_flight(40);
        let before = recorder.overall_percentage();
        recorder.complete_file(100, 40, Duration::from_millis(1));
        let after = recorder.overall_percentage();
        assert!(after >= before);
        assert_eq!(after, 100);
    }

    #[test]
    fn test_percentage_falls_back_to_file_count() {
        let recorder = MetricsRecorder::new(4, 0);
        recorder.complete_file(0, 0, Duration::from_millis(1));
        assert_eq!(recorder.overall_percentage(), 25);
    }

    #[test]
    fn test_sample_window_is_capped() {
        let recorder = MetricsRecorder::new(1, 100);
        for i in 0..(SPEED_SAMPLE_CAP + 50) {
            recorder.record_sample(i as f64);
        }
        let snap = recorder.snapshot();
        assert_eq!(snap.speed_samples.len(), SPEED_SAMPLE_CAP);
        // Oldest samples were evicted
        assert!(snap.speed_samples[0].1 >= 50.0);
        assert_eq!(snap.peak_speed_mbps, (SPEED_SAMPLE_CAP + 49) as f64);
    }

    #[test]
    fn test_rollback_unwinds_counters() {
        let recorder = MetricsRecorder::new(2, 200);
        recorder.complete_file(100, 0, Duration::from_millis(1));
        recorder.rollback_file(100);
        let snap = recorder.snapshot();
        assert_eq!(snap.bytes_copied, 0);
        assert_eq!(snap.files_processed, 0);
    }
}
