use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{info, warn};

use super::storage::{load_weight_state, save_weight_state};
use super::types::WeightState;
use crate::scoring::{Profile, WeightVector};

#[derive(Debug, Error)]
pub enum WeightError {
    #[error("invalid weights: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("failed to persist weights: {0:#}")]
    Storage(#[from] anyhow::Error),
}

/// Per-profile weight vectors: persisted active records first, compiled
/// defaults second.
///
/// All writes go through one mutex, and the in-memory state only changes
/// after the new state has been written to disk, so a failed write leaves
/// the previous weights in place.
pub struct WeightStore {
    path: Option<PathBuf>,
    defaults: BTreeMap<Profile, WeightVector>,
    state: Mutex<WeightState>,
}

impl WeightStore {
    /// Store backed by a JSON file; missing files start empty.
    pub fn open(path: PathBuf, defaults: BTreeMap<Profile, WeightVector>) -> anyhow::Result<Self> {
        let state = load_weight_state(&path)?;
        Ok(Self {
            path: Some(path),
            defaults,
            state: Mutex::new(state),
        })
    }

    /// Store that never touches the filesystem.
    pub fn in_memory(defaults: BTreeMap<Profile, WeightVector>) -> Self {
        Self {
            path: None,
            defaults,
            state: Mutex::new(WeightState::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WeightState> {
        // Writers swap the whole state in one assignment, so a poisoned
        // guard still holds a consistent state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Active persisted weights for `profile`, else its compiled default.
    /// Logs and returns an empty vector when neither exists.
    pub fn get_weights(&self, profile: Profile) -> WeightVector {
        if let Some(vector) = self.lock().active_vector(profile) {
            return vector;
        }
        match self.defaults.get(&profile) {
            Some(vector) if !vector.is_empty() => vector.clone(),
            _ => {
                warn!(%profile, "no persisted or default weights for profile");
                WeightVector::new()
            }
        }
    }

    /// True when `profile` currently uses persisted weights.
    pub fn has_persisted(&self, profile: Profile) -> bool {
        self.lock().active_vector(profile).is_some()
    }

    /// Replace every active weight of `profile` with `vector`, all or nothing.
    pub fn set_weights(&self, profile: Profile, vector: &WeightVector) -> Result<(), WeightError> {
        self.set_profiles(&[(profile, vector.clone())])
    }

    /// Replace the vectors of several profiles in one write. Either every
    /// profile changes or none does.
    pub fn set_profiles(&self, updates: &[(Profile, WeightVector)]) -> Result<(), WeightError> {
        let errors: Vec<String> = updates
            .iter()
            .flat_map(|(profile, vector)| {
                check_vector(vector).into_iter().map(move |e| format!("{}: {}", profile, e))
            })
            .collect();
        if !errors.is_empty() {
            return Err(WeightError::Invalid(errors));
        }

        let mut guard = self.lock();
        let mut next = guard.clone();
        for (profile, vector) in updates {
            next.replace_profile(*profile, vector);
        }
        self.persist(&next)?;
        *guard = next;

        for (profile, vector) in updates {
            info!(%profile, criteria = vector.len(), "weights updated");
        }
        Ok(())
    }

    /// Deactivate persisted weights so `profile` falls back to its default.
    pub fn reset_weights(&self, profile: Profile) -> Result<bool, WeightError> {
        let mut guard = self.lock();
        let mut next = guard.clone();
        if !next.deactivate_profile(profile) {
            return Ok(false);
        }
        self.persist(&next)?;
        *guard = next;

        info!(%profile, "weights reset to defaults");
        Ok(true)
    }

    fn persist(&self, state: &WeightState) -> anyhow::Result<()> {
        match self.path {
            Some(ref path) => save_weight_state(path, state),
            None => Ok(()),
        }
    }
}

fn check_vector(vector: &WeightVector) -> Vec<String> {
    let mut errors = Vec::new();
    if vector.is_empty() {
        errors.push("weight vector is empty".to_string());
    }
    for (criterion, weight) in vector.iter() {
        if !weight.is_finite() {
            errors.push(format!("{}: weight must be a finite number", criterion));
        } else if weight < 0.0 {
            errors.push(format!("{}: weight must be non-negative (got {})", criterion, weight));
        }
    }
    errors
}
