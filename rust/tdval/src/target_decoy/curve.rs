use serde::{
    Deserialize,
    Serialize,
};

use crate::models::ScoreDirection;

/// One sample of the calibration curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub score: f64,
    pub pep: f64,
}

/// Monotonic score -> posterior error probability mapping.
///
/// Points are kept sorted by ascending raw score with unique scores.
/// Lookups interpolate linearly between neighbouring samples and clamp to
/// the end samples outside the observed range.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CalibrationCurve {
    points: Vec<CurvePoint>,
}

impl CalibrationCurve {
    /// Builds the curve from scores ordered worst -> best and their fitted ratios.
    pub(crate) fn from_quality_ordered(
        scores: &[f64],
        peps: &[f64],
        direction: ScoreDirection,
    ) -> Self {
        assert_eq!(scores.len(), peps.len());
        let mut pairs: Vec<(f64, f64)> = scores.iter().copied().zip(peps.iter().copied()).collect();
        // worst -> best is ascending score for higher-is-better and descending otherwise
        if direction == ScoreDirection::LowerIsBetter {
            pairs.reverse();
        }

        let mut points: Vec<CurvePoint> = Vec::with_capacity(pairs.len());
        let mut tie_count = 0usize;
        for (score, pep) in pairs {
            match points.last_mut() {
                Some(last) if last.score == score => {
                    // running mean over tied scores
                    tie_count += 1;
                    last.pep += (pep - last.pep) / tie_count as f64;
                }
                _ => {
                    tie_count = 1;
                    points.push(CurvePoint { score, pep });
                }
            }
        }
        Self { points }
    }

    /// Restores a curve from stored samples, re-sorting them by score.
    pub(crate) fn from_points(mut points: Vec<CurvePoint>) -> Self {
        points.sort_by(|a, b| a.score.total_cmp(&b.score));
        points.dedup_by(|a, b| a.score == b.score);
        Self { points }
    }

    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Posterior error probability at `score`, 0.0 for an empty curve.
    pub fn probability(&self, score: f64) -> f64 {
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 0.0,
        };
        if score <= first.score {
            return first.pep;
        }
        if score >= last.score {
            return last.pep;
        }

        // First element >= score, guaranteed in 1..len by the checks above
        let i = self.points.partition_point(|p| p.score < score);
        let lo = self.points[i - 1];
        let hi = self.points[i];
        let frac = (score - lo.score) / (hi.score - lo.score);
        // keep rounding from stepping outside the segment, neighbours stay ordered
        (lo.pep + (hi.pep - lo.pep) * frac).clamp(lo.pep.min(hi.pep), lo.pep.max(hi.pep))
    }
}
