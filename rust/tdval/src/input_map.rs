//! Per search engine calibration of raw scores (usually e-values).

use std::collections::{
    BTreeMap,
    BTreeSet,
};

use rayon::prelude::*;
use tracing::{
    debug,
    info,
};

use crate::errors::{
    Result,
    TdValError,
    check_score,
};
use crate::models::{
    CalibrationStatus,
    EngineId,
    ScoreDirection,
};
use crate::progress::ProgressReporter;
use crate::target_decoy::{
    CalibrationParams,
    TargetDecoyMap,
};

/// One [`TargetDecoyMap`] per search engine.
///
/// An engine only shows up once it received an entry.
#[derive(Debug, Clone)]
pub struct InputMap {
    default_direction: ScoreDirection,
    directions: BTreeMap<EngineId, ScoreDirection>,
    params: CalibrationParams,
    maps: BTreeMap<EngineId, TargetDecoyMap>,
}

impl Default for InputMap {
    /// E-value maps, lower is better.
    fn default() -> Self {
        Self::new(ScoreDirection::LowerIsBetter)
    }
}

impl InputMap {
    pub fn new(default_direction: ScoreDirection) -> Self {
        Self::with_params(default_direction, CalibrationParams::default())
    }

    pub fn with_params(default_direction: ScoreDirection, params: CalibrationParams) -> Self {
        Self {
            default_direction,
            directions: BTreeMap::new(),
            params,
            maps: BTreeMap::new(),
        }
    }

    /// Overrides the score direction of one engine.
    pub fn set_engine_direction(&mut self, engine: EngineId, direction: ScoreDirection) {
        self.directions.insert(engine, direction);
        if let Some(map) = self.maps.get_mut(&engine) {
            map.set_direction(direction);
        }
    }

    pub fn engine_direction(&self, engine: EngineId) -> ScoreDirection {
        self.directions
            .get(&engine)
            .copied()
            .unwrap_or(self.default_direction)
    }

    pub fn add_entry(&mut self, engine: EngineId, score: f64, is_decoy: bool) -> Result<()> {
        let score = check_score(score, "adding an entry")
            .map_err(|e| e.append_to_context(&format!(" for search engine {}", engine)))?;
        let direction = self.engine_direction(engine);
        let params = self.params;
        self.maps
            .entry(engine)
            .or_insert_with(|| TargetDecoyMap::with_params(direction, params))
            .put(score, is_decoy)
    }

    pub fn total_observations(&self) -> usize {
        self.maps.values().map(|m| m.get_map_size()).sum()
    }

    /// Calibrates every engine, one after the other.
    ///
    /// The reporter maximum is the total observation count across engines.
    /// Stops at the first cancelled engine; engines already done keep their new curve.
    pub fn estimate_probabilities(
        &mut self,
        reporter: &(impl ProgressReporter + ?Sized),
    ) -> CalibrationStatus {
        reporter.set_max(self.total_observations() as u64);
        for (engine, map) in self.maps.iter_mut() {
            if reporter.is_cancelled() {
                return CalibrationStatus::Cancelled;
            }
            debug!(
                "Estimating probabilities for search engine {} ({} entries)",
                engine,
                map.get_map_size()
            );
            if map.estimate_probabilities(reporter).is_cancelled() {
                info!("Calibration cancelled while processing search engine {}", engine);
                return CalibrationStatus::Cancelled;
            }
        }
        CalibrationStatus::Completed
    }

    /// Same as [`InputMap::estimate_probabilities`] but engines run on the rayon pool.
    pub fn estimate_probabilities_parallel(
        &mut self,
        reporter: &(impl ProgressReporter + ?Sized),
    ) -> CalibrationStatus {
        reporter.set_max(self.total_observations() as u64);
        let any_cancelled = self
            .maps
            .par_iter_mut()
            .map(|(_, map)| {
                if reporter.is_cancelled() {
                    return CalibrationStatus::Cancelled;
                }
                map.estimate_probabilities(reporter)
            })
            .any(|status| status.is_cancelled());

        if any_cancelled {
            CalibrationStatus::Cancelled
        } else {
            CalibrationStatus::Completed
        }
    }

    pub fn get_probability(&mut self, engine: EngineId, score: f64) -> Result<f64> {
        self.maps
            .get_mut(&engine)
            .ok_or(TdValError::UnknownEngine { engine })?
            .get_probability(score)
    }

    pub fn get_map(&self, engine: EngineId) -> Option<&TargetDecoyMap> {
        self.maps.get(&engine)
    }

    pub fn size(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn is_multiple_search_engines(&self) -> bool {
        self.size() > 1
    }

    pub fn engine_ids(&self) -> impl Iterator<Item = EngineId> + '_ {
        self.maps.keys().copied()
    }

    /// Some map, only meaningful when a single engine is in use.
    pub fn get_first_map(&self) -> Option<&TargetDecoyMap> {
        self.maps.values().next()
    }

    /// Engines whose distribution cannot be trusted.
    ///
    /// A single engine is always accepted as is.
    pub fn suspicious_input(&self) -> BTreeSet<EngineId> {
        if !self.is_multiple_search_engines() {
            return BTreeSet::new();
        }
        self.maps
            .iter()
            .filter(|(_, map)| map.suspicious_input())
            .map(|(engine, _)| *engine)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{
        NoProgress,
        SharedProgress,
    };

    fn two_engine_map() -> InputMap {
        let mut map = InputMap::default();
        for i in 0..100 {
            // e-values, targets small
            map.add_entry(0, 10f64.powf(-5.0 - i as f64 / 20.0), false)
                .unwrap();
            map.add_entry(0, 10f64.powf(-(i as f64) / 50.0), true).unwrap();
        }
        for i in 0..5 {
            map.add_entry(1, i as f64, i % 2 == 0).unwrap();
        }
        map
    }

    #[test]
    fn test_unknown_engine() {
        let mut map = two_engine_map();
        match map.get_probability(7, 0.1) {
            Err(TdValError::UnknownEngine { engine }) => assert_eq!(engine, 7),
            other => panic!("Expected unknown engine error, got {:?}", other),
        }
    }

    #[test]
    fn test_add_entry_rejects_nan() {
        let mut map = InputMap::default();
        assert!(map.add_entry(2, f64::NAN, false).is_err());
        assert!(map.is_empty());
        assert!(map.get_probability(2, 0.1).is_err());
    }

    #[test]
    fn test_progress_aggregates_over_engines() {
        let mut map = two_engine_map();
        let progress = SharedProgress::new();
        let status = map.estimate_probabilities(&progress);
        assert_eq!(status, CalibrationStatus::Completed);
        assert_eq!(progress.max(), 205);
        assert_eq!(progress.position(), 205);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut seq = two_engine_map();
        let mut par = two_engine_map();
        seq.estimate_probabilities(&NoProgress);
        par.estimate_probabilities_parallel(&NoProgress);
        for engine in [0, 1] {
            assert_eq!(
                seq.get_map(engine).unwrap().curve(),
                par.get_map(engine).unwrap().curve()
            );
        }
    }

    #[test]
    fn test_cancelled_input_map_stops() {
        let mut map = two_engine_map();
        let progress = SharedProgress::new();
        progress.cancel();
        assert!(map.estimate_probabilities(&progress).is_cancelled());
        assert!(map.get_map(0).unwrap().is_dirty());
        assert!(map.get_map(1).unwrap().is_dirty());
    }

    #[test]
    fn test_engine_direction_override() {
        let mut map = InputMap::default();
        map.set_engine_direction(3, ScoreDirection::HigherIsBetter);
        map.add_entry(3, 42.0, false).unwrap();
        map.add_entry(4, 0.01, false).unwrap();
        assert_eq!(
            map.get_map(3).unwrap().direction(),
            ScoreDirection::HigherIsBetter
        );
        assert_eq!(
            map.get_map(4).unwrap().direction(),
            ScoreDirection::LowerIsBetter
        );
    }
}
