/*!
 * Cooperative cancel and pause tokens
 *
 * The engine never owns an event loop; callers flip these tokens from any
 * thread and the streaming loops observe them at chunk boundaries.
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Shared cancellation flag, polled at every chunk boundary
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; takes effect at the next chunk boundary
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Pause gate that blocks streaming loops while paused
///
/// A paused loop still observes cancellation: the wait re-checks the cancel
/// token on a short interval so cancel-while-paused unblocks promptly.
#[derive(Clone)]
pub struct PauseGate {
    state: Arc<GateState>,
}

struct GateState {
    paused: Mutex<bool>,
    resumed: Condvar,
}

impl PauseGate {
    pub fn new() -> Self {
        Self {
            state: Arc::new(GateState {
                paused: Mutex::new(false),
                resumed: Condvar::new(),
            }),
        }
    }

    pub fn pause(&self) {
        let mut paused = self.state.paused.lock().unwrap();
        *paused = true;
    }

    pub fn resume(&self) {
        let mut paused = self.state.paused.lock().unwrap();
        *paused = false;
        self.state.resumed.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        *self.state.paused.lock().unwrap()
    }

    /// Block until resumed or cancelled; returns immediately when not paused
    pub fn wait_while_paused(&self, cancel: &CancelToken) {
        let mut paused = self.state.paused.lock().unwrap();
        while *paused && !cancel.is_cancelled() {
            let (guard, _timeout) = self
                .state
                .resumed
                .wait_timeout(paused, Duration::from_millis(100))
                .unwrap();
            paused = guard;
        }
    }
}

impl Default for PauseGate {
    fn default() -> Self {
        Self::new()
    }
}
