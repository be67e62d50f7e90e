use tracing::debug;

use crate::errors::Result;
use crate::models::{
    CalibrationStatus,
    ScoreDirection,
};
use crate::progress::ProgressReporter;
use crate::target_decoy::{
    CalibrationParams,
    TargetDecoyMap,
};
use crate::validation::TargetDecoyResults;

/// Protein level score distribution of a whole project.
///
/// Protein inference can change the representative score of a group several
/// times, so points are retracted with [`ProteinMap::remove_point`] and
/// re-added instead of rebuilding the map.
#[derive(Debug, Clone)]
pub struct ProteinMap {
    map: TargetDecoyMap,
}

impl Default for ProteinMap {
    /// Protein scores are fused error probabilities, lower is better.
    fn default() -> Self {
        Self::new(ScoreDirection::LowerIsBetter)
    }
}

impl ProteinMap {
    pub fn new(direction: ScoreDirection) -> Self {
        Self {
            map: TargetDecoyMap::new(direction),
        }
    }

    pub fn with_params(direction: ScoreDirection, params: CalibrationParams) -> Self {
        Self {
            map: TargetDecoyMap::with_params(direction, params),
        }
    }

    pub fn add_point(&mut self, score: f64, is_decoy: bool) -> Result<()> {
        self.map.put(score, is_decoy)
    }

    /// Best effort, retracting a point that is not there does nothing.
    pub fn remove_point(&mut self, score: f64, is_decoy: bool) -> bool {
        self.map.remove(score, is_decoy)
    }

    /// Replaces the score of a protein group.
    ///
    /// Returns whether `old_score` was found. The new score is added either
    /// way, so a `false` means the map grew by one point.
    pub fn update_point(
        &mut self,
        old_score: f64,
        new_score: f64,
        is_decoy: bool,
    ) -> Result<bool> {
        crate::errors::check_score(new_score, "updating a protein score")?;
        let removed = self.remove_point(old_score, is_decoy);
        if !removed {
            debug!(
                "Protein score {} (decoy: {}) not found when updating to {}",
                old_score, is_decoy, new_score
            );
        }
        self.add_point(new_score, is_decoy)?;
        Ok(removed)
    }

    pub fn estimate_probabilities(
        &mut self,
        reporter: &(impl ProgressReporter + ?Sized),
    ) -> CalibrationStatus {
        reporter.set_max(self.map.get_map_size() as u64);
        self.map.estimate_probabilities(reporter)
    }

    pub fn get_probability(&mut self, score: f64) -> Result<f64> {
        self.map.get_probability(score)
    }

    pub fn suspicious_input(&self) -> bool {
        self.map.suspicious_input()
    }

    pub fn get_map_size(&self) -> usize {
        self.map.get_map_size()
    }

    pub fn target_decoy_results(&mut self, fdr_limit: f64) -> Result<TargetDecoyResults> {
        self.map.target_decoy_results(fdr_limit)
    }

    pub fn target_decoy_map(&self) -> &TargetDecoyMap {
        &self.map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;

    #[test]
    fn test_rescoring_a_group() {
        let mut proteins = ProteinMap::default();
        for i in 0..60 {
            proteins.add_point(1e-6 * (i + 1) as f64, false).unwrap();
            proteins.add_point(0.5 + i as f64 / 200.0, true).unwrap();
        }
        proteins.estimate_probabilities(&NoProgress);
        let good = proteins.get_probability(1e-6).unwrap();
        assert_eq!(good, 0.0);

        // group got worse after inference settled
        assert!(proteins.update_point(1e-6, 0.9, false).unwrap());
        assert_eq!(proteins.get_map_size(), 120);
        let moved = proteins.get_probability(0.9).unwrap();
        assert!(moved > 0.5, "PEP at 0.9 was {}", moved);
    }

    #[test]
    fn test_redundant_removal() {
        let mut proteins = ProteinMap::default();
        proteins.add_point(0.01, false).unwrap();
        assert!(proteins.remove_point(0.01, false));
        assert!(!proteins.remove_point(0.01, false));
        assert_eq!(proteins.get_map_size(), 0);
    }

    #[test]
    fn test_update_rejects_nan_without_removing() {
        let mut proteins = ProteinMap::default();
        proteins.add_point(0.01, false).unwrap();
        assert!(proteins.update_point(0.01, f64::NAN, false).is_err());
        assert_eq!(proteins.get_map_size(), 1);
    }

    #[test]
    fn test_update_reports_missing_old_score() {
        let mut proteins = ProteinMap::default();
        proteins.add_point(0.01, false).unwrap();
        // wrong label, nothing to retract
        assert!(!proteins.update_point(0.01, 0.02, true).unwrap());
        assert_eq!(proteins.get_map_size(), 2);
        assert!(proteins.update_point(0.01, 0.03, false).unwrap());
        assert_eq!(proteins.get_map_size(), 2);
    }
}
