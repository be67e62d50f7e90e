use std::io::{
    Read,
    Write,
};

use serde::{
    Deserialize,
    Serialize,
};

use super::curve::{
    CalibrationCurve,
    CurvePoint,
};
use super::map::TargetDecoyMap;
use super::window::CalibrationParams;
use crate::errors::{
    Result,
    TdValError,
    check_score,
};
use crate::models::{
    Observation,
    ScoreDirection,
};

/// Flat, order independent representation of a [`TargetDecoyMap`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSnapshot {
    pub direction: ScoreDirection,
    #[serde(default)]
    pub params: CalibrationParams,
    pub observations: Vec<Observation>,
    /// Cached curve, only present when the map was clean when saved.
    #[serde(default)]
    pub curve: Option<Vec<CurvePoint>>,
}

impl MapSnapshot {
    pub fn to_writer(&self, writer: impl Write) -> Result<()> {
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    pub fn from_reader(reader: impl Read) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }
}

impl TargetDecoyMap {
    pub fn snapshot(&self) -> MapSnapshot {
        let curve = match (&self.curve, self.dirty) {
            (Some(curve), false) => Some(curve.points().to_vec()),
            _ => None,
        };
        MapSnapshot {
            direction: self.direction,
            params: self.params,
            observations: self.observations.clone(),
            curve,
        }
    }

    /// Rebuilds a map, validating every stored score.
    ///
    /// The map comes back clean only if the snapshot carried a curve,
    /// otherwise it has to be recalibrated.
    pub fn from_snapshot(snapshot: MapSnapshot) -> Result<Self> {
        let MapSnapshot {
            direction,
            params,
            observations,
            curve,
        } = snapshot;

        let mut map = TargetDecoyMap::with_params(direction, params);
        for (i, obs) in observations.into_iter().enumerate() {
            map.put(obs.score, obs.is_decoy)
                .map_err(|e| e.append_to_context(&format!(", observation {} of snapshot", i)))?;
        }

        match curve {
            Some(points) => {
                for p in points.iter() {
                    check_score(p.score, "curve point of snapshot")?;
                    if !(0.0..=1.0).contains(&p.pep) {
                        return Err(TdValError::Snapshot {
                            msg: format!("curve probability {} outside [0, 1]", p.pep),
                        });
                    }
                }
                let curve = CalibrationCurve::from_points(points);
                check_monotonic(&curve, direction)?;
                map.curve = Some(curve);
                map.dirty = false;
            }
            None => {
                map.curve = None;
                map.dirty = !map.observations.is_empty();
            }
        }
        Ok(map)
    }
}

/// PEPs must never rise as the score gets better.
fn check_monotonic(curve: &CalibrationCurve, direction: ScoreDirection) -> Result<()> {
    for w in curve.points().windows(2) {
        // points are sorted by ascending score
        let (worse, better) = match direction {
            ScoreDirection::HigherIsBetter => (w[0], w[1]),
            ScoreDirection::LowerIsBetter => (w[1], w[0]),
        };
        if better.pep > worse.pep {
            return Err(TdValError::Snapshot {
                msg: format!(
                    "curve not monotonic, PEP {} at score {} is above PEP {} at worse score {}",
                    better.pep, better.score, worse.pep, worse.score
                ),
            });
        }
    }
    Ok(())
}
