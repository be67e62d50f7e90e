use std::time::Instant;

use tracing::{
    debug,
    trace,
};

use super::curve::CalibrationCurve;
use super::isotonic::antitonic_fit;
use super::window::{
    CalibrationParams,
    DecoyWindow,
};
use crate::errors::{
    Result,
    check_score,
};
use crate::models::{
    CalibrationStatus,
    Observation,
    ScoreDirection,
};
use crate::progress::{
    NoProgress,
    ProgressReporter,
};

/// Below this many observations a map is never trusted.
pub const MIN_OBSERVATIONS: usize = 2 * super::window::MIN_WINDOW_SIZE;

/// Minimum probability that a random target outranks a random decoy.
///
/// 0.5 means targets and decoys are indistinguishable.
pub const MIN_SEPARATION_AUC: f64 = 0.6;

/// Target/decoy score distribution for one scoring context.
///
/// Holds the raw observations plus, once [`TargetDecoyMap::estimate_probabilities`]
/// ran, a monotonic calibration curve turning a score into a PEP.
///
/// Any `put`/`remove` marks the curve dirty. [`TargetDecoyMap::get_probability`]
/// recomputes a dirty curve before answering, so lookups never read stale data.
#[derive(Debug, Clone)]
pub struct TargetDecoyMap {
    pub(super) direction: ScoreDirection,
    pub(super) params: CalibrationParams,
    pub(super) observations: Vec<Observation>,
    pub(super) n_decoys: usize,
    pub(super) curve: Option<CalibrationCurve>,
    pub(super) dirty: bool,
}

impl TargetDecoyMap {
    pub fn new(direction: ScoreDirection) -> Self {
        Self::with_params(direction, CalibrationParams::default())
    }

    pub fn with_params(direction: ScoreDirection, params: CalibrationParams) -> Self {
        Self {
            direction,
            params,
            observations: Vec::new(),
            n_decoys: 0,
            curve: None,
            dirty: false,
        }
    }

    pub fn direction(&self) -> ScoreDirection {
        self.direction
    }

    pub fn params(&self) -> &CalibrationParams {
        &self.params
    }

    /// Changes the score direction, the curve has to be rebuilt afterwards.
    pub fn set_direction(&mut self, direction: ScoreDirection) {
        if self.direction != direction {
            self.direction = direction;
            self.mark_dirty();
        }
    }

    pub fn put(&mut self, score: f64, is_decoy: bool) -> Result<()> {
        let score = check_score(score, "adding a point to a target/decoy map")?;
        self.observations.push(Observation::new(score, is_decoy));
        if is_decoy {
            self.n_decoys += 1;
        }
        self.mark_dirty();
        Ok(())
    }

    /// Removes the first observation equal to `(score, is_decoy)`.
    ///
    /// Returns whether something was removed, a missing point is not an error.
    pub fn remove(&mut self, score: f64, is_decoy: bool) -> bool {
        let pos = self
            .observations
            .iter()
            .position(|o| o.score == score && o.is_decoy == is_decoy);
        match pos {
            Some(i) => {
                self.observations.remove(i);
                if is_decoy {
                    self.n_decoys -= 1;
                }
                self.mark_dirty();
                true
            }
            None => {
                trace!("No point ({}, decoy={}) to remove", score, is_decoy);
                false
            }
        }
    }

    /// Moves every observation of `other` into this map.
    pub fn absorb(&mut self, other: TargetDecoyMap) {
        if other.observations.is_empty() {
            return;
        }
        self.n_decoys += other.n_decoys;
        self.observations.extend(other.observations);
        self.mark_dirty();
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn get_map_size(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn n_decoys(&self) -> usize {
        self.n_decoys
    }

    pub fn n_targets(&self) -> usize {
        self.observations.len() - self.n_decoys
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// The current curve, `None` if never calibrated or empty.
    ///
    /// Check [`TargetDecoyMap::is_dirty`] before trusting it.
    pub fn curve(&self) -> Option<&CalibrationCurve> {
        self.curve.as_ref()
    }

    /// Observations sorted from the worst to the best match.
    ///
    /// Decoys go before targets on tied scores so the order never depends on
    /// insertion order.
    fn quality_sorted(&self) -> Vec<Observation> {
        let mut sorted = self.observations.clone();
        let direction = self.direction;
        sorted.sort_by(|a, b| {
            direction
                .quality(a.score)
                .total_cmp(&direction.quality(b.score))
                .then(b.is_decoy.cmp(&a.is_decoy))
        });
        sorted
    }

    /// Rebuilds the calibration curve.
    ///
    /// Progress is reported one unit per observation, the caller is expected
    /// to have set the maximum. On cancellation the previous curve and dirty
    /// flag are left untouched.
    pub fn estimate_probabilities(
        &mut self,
        reporter: &(impl ProgressReporter + ?Sized),
    ) -> CalibrationStatus {
        let st = Instant::now();
        if self.observations.is_empty() {
            self.curve = None;
            self.dirty = false;
            return CalibrationStatus::Completed;
        }

        let sorted = self.quality_sorted();
        let n = sorted.len();
        let window_size = self.params.window_size(n);
        let check_interval = self.params.check_interval();
        let window = DecoyWindow::new(sorted.iter().map(|o| o.is_decoy));

        let mut ratios = Vec::with_capacity(n);
        for chunk_start in (0..n).step_by(check_interval) {
            if reporter.is_cancelled() {
                debug!(
                    "Calibration cancelled after {} of {} observations",
                    chunk_start, n
                );
                return CalibrationStatus::Cancelled;
            }
            let chunk_end = (chunk_start + check_interval).min(n);
            ratios.extend((chunk_start..chunk_end).map(|i| window.ratio_around(i, window_size)));
            reporter.increment((chunk_end - chunk_start) as u64);
        }

        let peps = antitonic_fit(&ratios);
        let scores: Vec<f64> = sorted.iter().map(|o| o.score).collect();
        let curve = CalibrationCurve::from_quality_ordered(&scores, &peps, self.direction);
        debug!(
            "Calibrated {} observations ({} decoys) with window {} into {} curve points in {:?}",
            n,
            self.n_decoys,
            window_size,
            curve.len(),
            st.elapsed()
        );
        self.curve = Some(curve);
        self.dirty = false;
        CalibrationStatus::Completed
    }

    /// Posterior error probability for `score`.
    ///
    /// A dirty map is recalibrated first. An empty map answers 0.0.
    pub fn get_probability(&mut self, score: f64) -> Result<f64> {
        let score = check_score(score, "probability lookup")?;
        if self.dirty {
            self.estimate_probabilities(&NoProgress);
        }
        Ok(self
            .curve
            .as_ref()
            .map(|c| c.probability(score))
            .unwrap_or(0.0))
    }

    /// Probability that a random target outranks a random decoy (ties count half).
    ///
    /// `None` when either class is empty.
    pub fn separation_auc(&self) -> Option<f64> {
        let n_decoys = self.n_decoys;
        let n_targets = self.n_targets();
        if n_decoys == 0 || n_targets == 0 {
            return None;
        }

        let sorted = self.quality_sorted();
        let direction = self.direction;
        // Mann-Whitney rank sum of the targets, average ranks for ties
        let mut target_rank_sum = 0.0;
        let mut i = 0;
        while i < sorted.len() {
            let quality = direction.quality(sorted[i].score);
            let mut j = i;
            while j < sorted.len() && direction.quality(sorted[j].score) == quality {
                j += 1;
            }
            let mean_rank = (i + 1 + j) as f64 / 2.0;
            let tied_targets = sorted[i..j].iter().filter(|o| !o.is_decoy).count();
            target_rank_sum += mean_rank * tied_targets as f64;
            i = j;
        }

        let n_t = n_targets as f64;
        let u = target_rank_sum - n_t * (n_t + 1.0) / 2.0;
        Some(u / (n_t * n_decoys as f64))
    }

    /// True when the distribution cannot support a reliable PEP estimate.
    ///
    /// That is: no decoys, no targets, fewer than [`MIN_OBSERVATIONS`] points,
    /// or targets that do not outrank decoys often enough
    /// ([`MIN_SEPARATION_AUC`]).
    pub fn suspicious_input(&self) -> bool {
        if self.observations.len() < MIN_OBSERVATIONS {
            return true;
        }
        match self.separation_auc() {
            None => true,
            Some(auc) => auc < MIN_SEPARATION_AUC,
        }
    }
}
