/*!
 * Caller-facing callbacks and the throttled progress reporter
 *
 * Callbacks may be invoked from any engine thread; hosts route them to their
 * own UI thread if they need one. The engine never assumes an event loop.
 */

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::control::{CancelToken, PauseGate};
use crate::core::metrics::MetricsSnapshot;

pub type ProgressFn = Arc<dyn Fn(u8, &str) + Send + Sync>;
pub type MetricsFn = Arc<dyn Fn(&MetricsSnapshot) + Send + Sync>;

/// Everything the caller wires into an operation
#[derive(Clone, Default)]
pub struct Callbacks {
    /// Throttled `(percentage, status message)` updates
    pub progress: Option<ProgressFn>,
    /// Periodic metrics snapshots, same cadence as progress
    pub metrics: Option<MetricsFn>,
    /// Cooperative cancellation flag
    pub cancel: CancelToken,
    /// Pause gate honoured at chunk boundaries
    pub pause: PauseGate,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress<F>(mut self, f: F) -> Self
    where
        F: Fn(u8, &str) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(f));
        self
    }

    pub fn with_metrics<F>(mut self, f: F) -> Self
    where
        F: Fn(&MetricsSnapshot) + Send + Sync + 'static,
    {
        self.metrics = Some(Arc::new(f));
        self
    }
}

/// Minimum interval between callback emissions (~10 Hz)
const EMIT_INTERVAL: Duration = Duration::from_millis(100);

/// Throttled emitter shared by the orchestrator and all copy cores
pub struct Reporter {
    pub callbacks: Callbacks,
    last_emit: Mutex<Option<Instant>>,
}

impl Reporter {
    pub fn new(callbacks: Callbacks) -> Self {
        Self {
            callbacks,
            last_emit: Mutex::new(None),
        }
    }

    pub fn cancel(&self) -> &CancelToken {
        &self.callbacks.cancel
    }

    pub fn pause(&self) -> &PauseGate {
        &self.callbacks.pause
    }

    /// Emit progress (and a lazily-built metrics snapshot) unless an emission
    /// happened within the throttle window
    pub fn try_report<F>(&self, percentage: u8, message: &str, snapshot: F)
    where
        F: FnOnce() -> MetricsSnapshot,
    {
        {
            let mut last = self.last_emit.lock().unwrap();
            let now = Instant::now();
            if let Some(prev) = *last {
                if now.duration_since(prev) < EMIT_INTERVAL {
                    return;
                }
            }
            *last = Some(now);
        }
        self.emit(percentage, message, snapshot);
    }

    /// Emit unconditionally; used for phase transitions and the final report
    pub fn report_now<F>(&self, percentage: u8, message: &str, snapshot: F)
    where
        F: FnOnce() -> MetricsSnapshot,
    {
        *self.last_emit.lock().unwrap() = Some(Instant::now());
        self.emit(percentage, message, snapshot);
    }

    fn emit<F>(&self, percentage: u8, message: &str, snapshot: F)
    where
        F: FnOnce() -> MetricsSnapshot,
    {
        if let Some(progress) = &self.callbacks.progress {
            progress(percentage, message);
        }
        if let Some(metrics) = &self.callbacks.metrics {
            let snap = snapshot();
            metrics(&snap);
        }
    }
}
