//! Target/decoy maps split by a grouping key.
//!
//! PSMs are usually split by precursor charge and peptides by modification
//! profile, since their score distributions differ. Groups too small to be
//! calibrated on their own get pooled into a shared map.

use std::collections::{
    BTreeMap,
    BTreeSet,
};
use std::fmt::Display;

use tracing::debug;

use crate::errors::{
    Result,
    TdValError,
};
use crate::models::{
    CalibrationStatus,
    ScoreDirection,
};
use crate::progress::ProgressReporter;
use crate::target_decoy::{
    CalibrationParams,
    TargetDecoyMap,
};

/// PSM level maps keyed by precursor charge.
pub type PsmMap = LevelMap<u8>;

/// Peptide level maps keyed by modification profile.
pub type PeptideMap = LevelMap<String>;

#[derive(Debug, Clone)]
pub struct LevelMap<K: Ord + Clone + Display> {
    direction: ScoreDirection,
    params: CalibrationParams,
    maps: BTreeMap<K, TargetDecoyMap>,
    pooled_keys: BTreeSet<K>,
    pooled: TargetDecoyMap,
}

impl<K: Ord + Clone + Display> LevelMap<K> {
    pub fn new(direction: ScoreDirection) -> Self {
        Self::with_params(direction, CalibrationParams::default())
    }

    pub fn with_params(direction: ScoreDirection, params: CalibrationParams) -> Self {
        Self {
            direction,
            params,
            maps: BTreeMap::new(),
            pooled_keys: BTreeSet::new(),
            pooled: TargetDecoyMap::with_params(direction, params),
        }
    }

    fn map_for(&self, key: &K) -> Option<&TargetDecoyMap> {
        if self.pooled_keys.contains(key) {
            Some(&self.pooled)
        } else {
            self.maps.get(key)
        }
    }

    fn map_for_mut(&mut self, key: &K) -> Option<&mut TargetDecoyMap> {
        if self.pooled_keys.contains(key) {
            Some(&mut self.pooled)
        } else {
            self.maps.get_mut(key)
        }
    }

    pub fn add_point(&mut self, key: K, score: f64, is_decoy: bool) -> Result<()> {
        if self.pooled_keys.contains(&key) {
            return self.pooled.put(score, is_decoy);
        }
        let (direction, params) = (self.direction, self.params);
        let context = format!(" in group {}", key);
        self.maps
            .entry(key)
            .or_insert_with(|| TargetDecoyMap::with_params(direction, params))
            .put(score, is_decoy)
            .map_err(|e| e.append_to_context(&context))
    }

    pub fn remove_point(&mut self, key: &K, score: f64, is_decoy: bool) -> bool {
        match self.map_for_mut(key) {
            Some(map) => map.remove(score, is_decoy),
            None => false,
        }
    }

    /// Pools every group with fewer than `min_size` points or without decoys.
    ///
    /// Returns the keys that were pooled by this call.
    pub fn merge_sparse_groups(&mut self, min_size: usize) -> Vec<K> {
        let sparse: Vec<K> = self
            .maps
            .iter()
            .filter(|(_, map)| map.get_map_size() < min_size || map.n_decoys() == 0)
            .map(|(key, _)| key.clone())
            .collect();

        for key in sparse.iter() {
            if let Some(map) = self.maps.remove(key) {
                debug!(
                    "Pooling group {} ({} points, {} decoys)",
                    key,
                    map.get_map_size(),
                    map.n_decoys()
                );
                self.pooled.absorb(map);
                self.pooled_keys.insert(key.clone());
            }
        }
        sparse
    }

    pub fn is_pooled(&self, key: &K) -> bool {
        self.pooled_keys.contains(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.maps.keys().chain(self.pooled_keys.iter())
    }

    pub fn get_map_size(&self) -> usize {
        self.maps.values().map(|m| m.get_map_size()).sum::<usize>() + self.pooled.get_map_size()
    }

    pub fn estimate_probabilities(
        &mut self,
        reporter: &(impl ProgressReporter + ?Sized),
    ) -> CalibrationStatus {
        reporter.set_max(self.get_map_size() as u64);
        for map in self.maps.values_mut().chain(std::iter::once(&mut self.pooled)) {
            if map.estimate_probabilities(reporter).is_cancelled() {
                return CalibrationStatus::Cancelled;
            }
        }
        CalibrationStatus::Completed
    }

    pub fn get_probability(&mut self, key: &K, score: f64) -> Result<f64> {
        match self.map_for_mut(key) {
            Some(map) => map.get_probability(score),
            None => Err(TdValError::UnknownGroup {
                key: key.to_string(),
            }),
        }
    }

    pub fn get_map(&self, key: &K) -> Option<&TargetDecoyMap> {
        self.map_for(key)
    }

    /// Keys whose (possibly pooled) map cannot be trusted.
    pub fn suspicious_input(&self) -> BTreeSet<K> {
        let mut out: BTreeSet<K> = self
            .maps
            .iter()
            .filter(|(_, map)| map.suspicious_input())
            .map(|(key, _)| key.clone())
            .collect();
        if !self.pooled_keys.is_empty() && self.pooled.suspicious_input() {
            out.extend(self.pooled_keys.iter().cloned());
        }
        out
    }
}
