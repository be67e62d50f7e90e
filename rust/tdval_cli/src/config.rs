use serde::{
    Deserialize,
    Serialize,
};
use std::collections::BTreeMap;
use std::path::{
    Path,
    PathBuf,
};
use tdval::{
    CalibrationParams,
    EngineId,
    ScoreDirection,
};

use crate::errors::CliError;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    pub input: Option<InputConfig>,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type")]
pub enum InputConfig {
    /// Columns: psm_id, engine, score, is_decoy and optionally charge, protein
    #[serde(rename = "csv")]
    Csv { path: PathBuf },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AnalysisConfig {
    /// Direction of the raw engine scores, e-values by default
    #[serde(default = "default_engine_direction")]
    pub engine_direction: ScoreDirection,
    #[serde(default)]
    pub engine_directions: BTreeMap<EngineId, ScoreDirection>,
    /// Minimum confidence (percent) for a match to be validated
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    #[serde(default = "default_fdr_limit")]
    pub fdr_limit: f64,
    /// Charge groups with fewer PSMs get pooled
    #[serde(default = "default_min_group_size")]
    pub min_group_size: usize,
    #[serde(default)]
    pub calibration: CalibrationParams,
    #[serde(default)]
    pub parallel: bool,
}

fn default_engine_direction() -> ScoreDirection {
    ScoreDirection::LowerIsBetter
}

fn default_min_confidence() -> f64 {
    95.0
}

fn default_fdr_limit() -> f64 {
    0.01
}

fn default_min_group_size() -> usize {
    tdval::target_decoy::MIN_OBSERVATIONS
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            engine_direction: default_engine_direction(),
            engine_directions: BTreeMap::new(),
            min_confidence: default_min_confidence(),
            fdr_limit: default_fdr_limit(),
            min_group_size: default_min_group_size(),
            calibration: CalibrationParams::default(),
            parallel: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutputConfig {
    pub directory: PathBuf,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, CliError> {
        let conf = std::fs::File::open(path).map_err(|e| CliError::io(e, path))?;
        let config: Config = serde_json::from_reader(conf)?;
        Ok(config)
    }
}
