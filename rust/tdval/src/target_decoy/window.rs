use serde::{
    Deserialize,
    Serialize,
};
use tracing::warn;

/// Fraction of the observations that goes into each sliding window.
pub const DEFAULT_WINDOW_FRACTION: f64 = 0.01;

/// Smallest window ever used, keeps small maps from fitting single hits.
pub const MIN_WINDOW_SIZE: usize = 25;

/// Observations processed between two progress reports / cancellation checks.
pub const DEFAULT_CHECK_INTERVAL: usize = 256;

/// Knobs of the windowed decoy-ratio estimation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParams {
    pub window_fraction: f64,
    pub min_window: usize,
    pub check_interval: usize,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            window_fraction: DEFAULT_WINDOW_FRACTION,
            min_window: MIN_WINDOW_SIZE,
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }
}

impl CalibrationParams {
    /// Window size for a map holding `n` observations.
    ///
    /// Never larger than `n` and never smaller than one.
    pub fn window_size(&self, n: usize) -> usize {
        let fraction = if self.window_fraction.is_finite() && self.window_fraction > 0.0 {
            self.window_fraction
        } else {
            warn!(
                "Window fraction {} is not usable, falling back to {}",
                self.window_fraction, DEFAULT_WINDOW_FRACTION
            );
            DEFAULT_WINDOW_FRACTION
        };
        let proportional = (n as f64 * fraction).ceil() as usize;
        proportional.max(self.min_window).min(n).max(1)
    }

    pub(crate) fn check_interval(&self) -> usize {
        self.check_interval.max(1)
    }
}

/// Cumulative decoy counts over a quality-sorted run of observations.
///
/// Lets any window ratio be read in constant time.
pub struct DecoyWindow {
    cumulative_decoys: Vec<u32>,
}

impl DecoyWindow {
    pub fn new(is_decoy: impl Iterator<Item = bool>) -> Self {
        let mut cumulative_decoys = vec![0u32];
        let mut running = 0u32;
        for decoy in is_decoy {
            if decoy {
                running += 1;
            }
            cumulative_decoys.push(running);
        }
        Self { cumulative_decoys }
    }

    pub fn len(&self) -> usize {
        self.cumulative_decoys.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decoy fraction in the window of `window_size` observations centred on `index`.
    ///
    /// Windows touching either end are shifted inwards so they keep their full size.
    pub fn ratio_around(&self, index: usize, window_size: usize) -> f64 {
        let n = self.len();
        if n == 0 {
            return 0.0;
        }
        let window_size = window_size.clamp(1, n);
        let half = window_size / 2;
        let end = (index.saturating_sub(half) + window_size).min(n);
        let start = end - window_size;
        let decoys = self.cumulative_decoys[end] - self.cumulative_decoys[start];
        decoys as f64 / window_size as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_size() {
        let params = CalibrationParams::default();
        assert_eq!(params.window_size(10), 10);
        assert_eq!(params.window_size(1000), MIN_WINDOW_SIZE);
        assert_eq!(params.window_size(10_000), 100);
        assert_eq!(params.window_size(0), 1);
    }

    #[test]
    fn test_window_ratio_edges() {
        // 5 decoys followed by 5 targets
        let labels = [true, true, true, true, true, false, false, false, false, false];
        let window = DecoyWindow::new(labels.iter().copied());
        assert_eq!(window.len(), 10);
        assert_eq!(window.ratio_around(0, 4), 1.0);
        assert_eq!(window.ratio_around(9, 4), 0.0);
        // centred on the boundary, window covers [3, 7)
        assert_eq!(window.ratio_around(5, 4), 0.5);
        // oversized windows fall back to the global ratio
        assert_eq!(window.ratio_around(2, 100), 0.5);
    }

    #[test]
    fn test_empty_window() {
        let window = DecoyWindow::new(std::iter::empty());
        assert!(window.is_empty());
        assert_eq!(window.ratio_around(0, 10), 0.0);
    }
}
