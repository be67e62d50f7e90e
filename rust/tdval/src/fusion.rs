//! Combining the hits of several search engines into one PSM score.

use std::collections::BTreeMap;

use crate::errors::{
    Result,
    TdValError,
    check_score,
};
use crate::input_map::InputMap;
use crate::models::{
    EngineId,
    ScoreDirection,
};

/// Product of error probabilities, clamped to [0, 1].
///
/// An empty input fuses to 1.0, nothing supports the match.
pub fn fuse_error_probabilities(peps: impl IntoIterator<Item = f64>) -> f64 {
    peps.into_iter()
        .map(|p| p.clamp(0.0, 1.0))
        .product::<f64>()
        .clamp(0.0, 1.0)
}

impl InputMap {
    /// Direction of the scores returned by [`InputMap::psm_score`].
    pub fn psm_score_direction(&self) -> ScoreDirection {
        match (self.is_multiple_search_engines(), self.engine_ids().next()) {
            (false, Some(engine)) => self.engine_direction(engine),
            _ => ScoreDirection::LowerIsBetter,
        }
    }

    /// Combined score of one spectrum match from the raw hits of each engine.
    ///
    /// With a single engine the best raw score is returned untouched. With
    /// several engines the best hit of each engine is calibrated and the PEPs
    /// are multiplied.
    pub fn psm_score(&mut self, hits: &[(EngineId, f64)]) -> Result<f64> {
        let mut best_per_engine: BTreeMap<EngineId, f64> = BTreeMap::new();
        for &(engine, score) in hits {
            let direction = self.engine_direction(engine);
            best_per_engine
                .entry(engine)
                .and_modify(|best| *best = direction.best(*best, score))
                .or_insert(score);
        }

        if !self.is_multiple_search_engines() {
            return match best_per_engine.into_iter().next() {
                Some((engine, _)) if self.get_map(engine).is_none() => {
                    Err(TdValError::UnknownEngine { engine })
                }
                Some((_, score)) => check_score(score, "single engine PSM score"),
                None => Ok(1.0),
            };
        }

        let mut peps = Vec::with_capacity(best_per_engine.len());
        for (engine, score) in best_per_engine {
            peps.push(self.get_probability(engine, score)?);
        }
        Ok(fuse_error_probabilities(peps))
    }
}
