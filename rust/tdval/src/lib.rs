#![doc = include_str!("../README.md")]

pub mod errors;
pub mod fusion;
pub mod input_map;
pub mod level_map;
pub mod models;
pub mod progress;
pub mod protein_map;
pub mod target_decoy;
pub mod validation;

// Re-export main structures
pub use crate::fusion::fuse_error_probabilities;
pub use crate::input_map::InputMap;
pub use crate::level_map::{
    LevelMap,
    PeptideMap,
    PsmMap,
};
pub use crate::models::{
    CalibrationStatus,
    EngineId,
    Observation,
    ScoreDirection,
};
pub use crate::progress::{
    NoProgress,
    ProgressReporter,
    SharedProgress,
};
pub use crate::protein_map::ProteinMap;
pub use crate::target_decoy::{
    CalibrationCurve,
    CalibrationParams,
    MapSnapshot,
    TargetDecoyMap,
};
pub use crate::validation::{
    MatchQuality,
    TargetDecoyResults,
    Validation,
    confidence,
};

// Re-export errors
pub use crate::errors::{
    Result,
    TdValError,
};
