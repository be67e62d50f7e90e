//! Progress reporting and cooperative cancellation.
//!
//! Calibration never talks to a UI directly. Callers hand in anything that
//! implements [`ProgressReporter`]; maps call `increment` every few hundred
//! observations and bail out when `is_cancelled` turns true.

use std::sync::Arc;
use std::sync::atomic::{
    AtomicBool,
    AtomicU64,
    Ordering,
};

pub trait ProgressReporter: Send + Sync {
    fn increment(&self, amount: u64);
    fn set_max(&self, max: u64);
    fn is_cancelled(&self) -> bool;
}

/// Reporter that ignores everything and never cancels.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn increment(&self, _amount: u64) {}
    fn set_max(&self, _max: u64) {}
    fn is_cancelled(&self) -> bool {
        false
    }
}

#[derive(Debug, Default)]
struct ProgressState {
    position: AtomicU64,
    max: AtomicU64,
    cancelled: AtomicBool,
}

/// Thread safe counter + cancel flag.
///
/// Clones share the same state, so one handle can be given to the
/// calibration worker while another is polled (or cancelled) from elsewhere.
#[derive(Debug, Default, Clone)]
pub struct SharedProgress {
    state: Arc<ProgressState>,
}

impl SharedProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> u64 {
        self.state.position.load(Ordering::Relaxed)
    }

    pub fn max(&self) -> u64 {
        self.state.max.load(Ordering::Relaxed)
    }

    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::Release);
    }

    /// Fraction done in [0, 1], 0 when no maximum was set.
    pub fn fraction(&self) -> f64 {
        let max = self.max();
        if max == 0 {
            return 0.0;
        }
        (self.position() as f64 / max as f64).min(1.0)
    }
}

impl ProgressReporter for SharedProgress {
    fn increment(&self, amount: u64) {
        self.state.position.fetch_add(amount, Ordering::Relaxed);
    }

    fn set_max(&self, max: u64) {
        self.state.max.store(max, Ordering::Relaxed);
    }

    fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }
}

impl ProgressReporter for indicatif::ProgressBar {
    fn increment(&self, amount: u64) {
        self.inc(amount);
    }

    fn set_max(&self, max: u64) {
        self.set_length(max);
    }

    fn is_cancelled(&self) -> bool {
        false
    }
}

impl<T: ProgressReporter + ?Sized> ProgressReporter for &T {
    fn increment(&self, amount: u64) {
        (**self).increment(amount)
    }

    fn set_max(&self, max: u64) {
        (**self).set_max(max)
    }

    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}
