use serde::{
    Deserialize,
    Serialize,
};

/// Index of a search engine inside an [`crate::InputMap`].
pub type EngineId = u16;

/// A single scored match, as seen by a target/decoy map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub score: f64,
    pub is_decoy: bool,
}

impl Observation {
    pub fn new(score: f64, is_decoy: bool) -> Self {
        Self { score, is_decoy }
    }
}

/// Which end of the score axis holds the good matches.
///
/// E-values and error probabilities are `LowerIsBetter`,
/// most engine scores (hyperscore, X!Tandem score ...) are `HigherIsBetter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreDirection {
    #[default]
    HigherIsBetter,
    LowerIsBetter,
}

impl ScoreDirection {
    /// Maps a raw score onto an axis where larger always means better.
    #[inline]
    pub fn quality(&self, score: f64) -> f64 {
        match self {
            ScoreDirection::HigherIsBetter => score,
            ScoreDirection::LowerIsBetter => -score,
        }
    }

    /// True when `a` is a strictly better match than `b`.
    #[inline]
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        self.quality(a) > self.quality(b)
    }

    /// The best of two scores under this direction.
    pub fn best(&self, a: f64, b: f64) -> f64 {
        if self.is_better(b, a) { b } else { a }
    }
}

/// What happened to a calibration request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationStatus {
    Completed,
    /// The reporter asked to stop, the previous curve (if any) was left in place.
    Cancelled,
}

impl CalibrationStatus {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CalibrationStatus::Cancelled)
    }
}
