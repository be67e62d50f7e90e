//! Turning posterior error probabilities into validation decisions.

use serde::Serialize;

use crate::errors::{
    Result,
    TdValError,
};
use crate::models::{
    Observation,
    ScoreDirection,
};
use crate::target_decoy::TargetDecoyMap;

/// Threshold based validation of a single match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Validation {
    pep_threshold: f64,
}

impl Validation {
    pub fn new(pep_threshold: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&pep_threshold) {
            return Err(TdValError::InvalidThreshold {
                value: pep_threshold,
                context: "PEP threshold must be within [0, 1]",
            });
        }
        Ok(Self { pep_threshold })
    }

    /// From a minimum confidence in percent, e.g. 95.0 accepts PEP <= 0.05.
    pub fn from_confidence(min_confidence: f64) -> Result<Self> {
        if !(0.0..=100.0).contains(&min_confidence) {
            return Err(TdValError::InvalidThreshold {
                value: min_confidence,
                context: "confidence must be within [0, 100]",
            });
        }
        Self::new(1.0 - min_confidence / 100.0)
    }

    pub fn pep_threshold(&self) -> f64 {
        self.pep_threshold
    }

    pub fn is_validated(&self, pep: f64) -> bool {
        pep <= self.pep_threshold
    }

    pub fn assess(&self, pep: f64) -> MatchQuality {
        MatchQuality {
            pep,
            confidence: confidence(pep),
            validated: self.is_validated(pep),
        }
    }
}

/// Confidence in percent, `(1 - PEP) * 100`.
pub fn confidence(pep: f64) -> f64 {
    (1.0 - pep.clamp(0.0, 1.0)) * 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchQuality {
    pub pep: f64,
    pub confidence: f64,
    pub validated: bool,
}

/// Outcome of thresholding a map at a given FDR.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetDecoyResults {
    pub fdr_limit: f64,
    pub direction: ScoreDirection,
    /// Worst score still accepted, `None` when nothing passes.
    ///
    /// Never falls inside a run of tied target scores, so accepting every
    /// score at least this good accepts exactly `n_validated` targets.
    pub score_threshold: Option<f64>,
    /// PEP of the worst accepted target. Flat PEP runs extend past the
    /// threshold, use [`TargetDecoyResults::is_accepted`] to filter matches.
    pub pep_limit: f64,
    pub n_validated: usize,
    /// Expected number of false positives among the validated targets.
    pub n_false_positives: f64,
    pub estimated_fdr: f64,
    pub estimated_fnr: f64,
    pub n_targets: usize,
}

impl TargetDecoyResults {
    /// True when `score` is at least as good as the accepted threshold.
    pub fn is_accepted(&self, score: f64) -> bool {
        match self.score_threshold {
            Some(threshold) => !self.direction.is_better(threshold, score),
            None => false,
        }
    }
}

impl TargetDecoyMap {
    /// Target PEPs ordered from the best to the worst target.
    fn ranked_target_peps(&mut self) -> Result<Vec<(Observation, f64)>> {
        let direction = self.direction();
        let mut targets: Vec<Observation> = self
            .observations()
            .iter()
            .filter(|o| !o.is_decoy)
            .copied()
            .collect();
        targets.sort_by(|a, b| {
            direction
                .quality(b.score)
                .total_cmp(&direction.quality(a.score))
        });
        targets
            .into_iter()
            .map(|o| Ok((o, self.get_probability(o.score)?)))
            .collect()
    }

    /// Q-value of every target, ordered from the best to the worst target.
    ///
    /// The summed PEP of the targets at or above a score estimates the false
    /// positives there, the running minimum from the worst end gives the q-value.
    pub fn q_values(&mut self) -> Result<Vec<(f64, f64)>> {
        let ranked = self.ranked_target_peps()?;
        let mut out = Vec::with_capacity(ranked.len());
        let mut false_positives = 0.0f64;
        for (i, (obs, pep)) in ranked.iter().enumerate() {
            false_positives += *pep;
            out.push((obs.score, false_positives / (i + 1) as f64));
        }

        // Reverse slice, and calculate the cumulative minimum
        let mut q_min = 1.0f64;
        for entry in out.iter_mut().rev() {
            q_min = q_min.min(entry.1);
            entry.1 = q_min;
        }
        Ok(out)
    }

    /// Deepest threshold whose estimated FDR stays within `fdr_limit`.
    pub fn target_decoy_results(&mut self, fdr_limit: f64) -> Result<TargetDecoyResults> {
        if !(fdr_limit > 0.0 && fdr_limit <= 1.0) {
            return Err(TdValError::InvalidThreshold {
                value: fdr_limit,
                context: "FDR limit must be within (0, 1]",
            });
        }
        let direction = self.direction();
        let ranked = self.ranked_target_peps()?;
        let total_true_positives: f64 = ranked.iter().map(|(_, pep)| 1.0 - pep).sum();

        let mut best: Option<(usize, f64)> = None;
        let mut false_positives = 0.0f64;
        for (i, (obs, pep)) in ranked.iter().enumerate() {
            false_positives += *pep;
            // cut only between distinct scores
            let end_of_tie = ranked
                .get(i + 1)
                .is_none_or(|(next, _)| next.score != obs.score);
            if end_of_tie && false_positives / (i + 1) as f64 <= fdr_limit {
                best = Some((i, false_positives));
            }
        }

        let results = match best {
            Some((i, n_false_positives)) => {
                let n_validated = i + 1;
                let validated_true_positives = n_validated as f64 - n_false_positives;
                let estimated_fnr = if total_true_positives > 0.0 {
                    ((total_true_positives - validated_true_positives) / total_true_positives)
                        .max(0.0)
                } else {
                    0.0
                };
                TargetDecoyResults {
                    fdr_limit,
                    direction,
                    score_threshold: Some(ranked[i].0.score),
                    pep_limit: ranked[i].1,
                    n_validated,
                    n_false_positives,
                    estimated_fdr: n_false_positives / n_validated as f64,
                    estimated_fnr,
                    n_targets: ranked.len(),
                }
            }
            None => TargetDecoyResults {
                fdr_limit,
                direction,
                score_threshold: None,
                pep_limit: 0.0,
                n_validated: 0,
                n_false_positives: 0.0,
                estimated_fdr: 0.0,
                estimated_fnr: if total_true_positives > 0.0 { 1.0 } else { 0.0 },
                n_targets: ranked.len(),
            },
        };
        Ok(results)
    }
}
