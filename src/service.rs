use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::property::{load_properties, merge_properties, save_properties, Property, PROPERTIES_FILE};
use crate::rescore::{rescore_all, RescoreReport, DEFAULT_BATCH_SIZE};
use crate::scoring::{
    bulk_normalize, validate_weight_update, Profile, ScoringConfig, ScoringEngine, ScoringError,
    WeightVector,
};
use crate::weights::{WeightError, WeightStore, WEIGHTS_FILE};

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("invalid weights: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error(transparent)]
    Weights(#[from] WeightError),
}

/// Where a weight update currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePhase {
    Idle,
    Validating,
    Persisting,
    Rescoring,
}

/// Scoring engine plus the property collection it publishes scores onto.
pub struct ScoringService {
    engine: ScoringEngine,
    properties: Mutex<Vec<Property>>,
    properties_path: Option<PathBuf>,
    batch_size: usize,
    phase: Mutex<UpdatePhase>,
    cancel: Arc<AtomicBool>,
}

impl ScoringService {
    /// Open the weight store and property collection under the configured data directory.
    pub fn open(config: &Config) -> Result<Self> {
        let data_dir = config.data_dir()?;
        let scoring = config.scoring.clone().unwrap_or_default();
        let store = WeightStore::open(data_dir.join(WEIGHTS_FILE), scoring.profile_defaults())?;
        let properties_path = data_dir.join(PROPERTIES_FILE);
        let properties = load_properties(&properties_path)?;
        debug!(count = properties.len(), dir = %data_dir.display(), "opened data directory");

        Ok(Self::with_parts(
            ScoringEngine::new(&scoring, Arc::new(store)),
            properties,
            Some(properties_path),
            config.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
        ))
    }

    /// Service without persistence, for embedding and tests.
    pub fn in_memory(scoring: &ScoringConfig, properties: Vec<Property>) -> Self {
        let store = WeightStore::in_memory(scoring.profile_defaults());
        Self::with_parts(
            ScoringEngine::new(scoring, Arc::new(store)),
            properties,
            None,
            DEFAULT_BATCH_SIZE,
        )
    }

    fn with_parts(
        engine: ScoringEngine,
        properties: Vec<Property>,
        properties_path: Option<PathBuf>,
        batch_size: usize,
    ) -> Self {
        Self {
            engine,
            properties: Mutex::new(properties),
            properties_path,
            batch_size,
            phase: Mutex::new(UpdatePhase::Idle),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    /// Flag checked between rescore batches; set it to interrupt a running
    /// rescore. Every new rescore starts by clearing it.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn phase(&self) -> UpdatePhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_properties(&self) -> MutexGuard<'_, Vec<Property>> {
        self.properties.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of every stored property.
    pub fn properties(&self) -> Vec<Property> {
        self.lock_properties().clone()
    }

    pub fn property(&self, id: u64) -> Option<Property> {
        self.lock_properties().iter().find(|p| p.id == id).cloned()
    }

    fn commit(&self, properties: &[Property]) -> Result<()> {
        match self.properties_path {
            Some(ref path) => save_properties(path, properties),
            None => Ok(()),
        }
    }

    pub fn get_current_weights(&self, profile: Profile) -> WeightVector {
        self.engine.get_current_weights(profile)
    }

    /// Score one stored property and persist its new score record.
    /// Scoring failures are recorded as zero scores and returned.
    pub fn calculate_score(&self, id: u64) -> Result<Result<f64, ScoringError>> {
        let mut properties = self.lock_properties();
        let property = properties
            .iter_mut()
            .find(|p| p.id == id)
            .with_context(|| format!("No property with id {}", id))?;
        let outcome = self.engine.calculate_score(property);
        self.commit(&properties)?;
        Ok(outcome)
    }

    /// Re-score every stored property, committing after each batch.
    pub fn rescore_all(&self) -> RescoreReport {
        let mut properties = self.lock_properties();
        self.cancel.store(false, Ordering::Relaxed);
        rescore_all(
            &self.engine,
            &mut properties,
            self.batch_size,
            Some(&self.cancel),
            |all| self.commit(all),
        )
    }

    /// Add or replace properties by id and persist the collection.
    /// Returns the number of new ids.
    pub fn import(&self, incoming: Vec<Property>) -> Result<usize> {
        let mut properties = self.lock_properties();
        let mut next = properties.clone();
        let added = merge_properties(&mut next, incoming);
        self.commit(&next)?;
        *properties = next;
        Ok(added)
    }

    /// Validate, normalize and persist new weights for `profile`, then re-score everything.
    ///
    /// Invalid input is rejected before anything changes. Rescoring is best
    /// effort; check [`RescoreReport::is_complete`].
    pub fn update_weights(
        &self,
        profile: Profile,
        raw: &BTreeMap<String, f64>,
    ) -> Result<RescoreReport, UpdateError> {
        self.apply_updates(&[(profile, raw)])
    }

    /// Update the investment and lifestyle vectors together, re-scoring once.
    /// Both vectors are saved in a single write, so a failure keeps both old ones.
    pub fn update_dual_profile_weights(
        &self,
        investment: &BTreeMap<String, f64>,
        lifestyle: &BTreeMap<String, f64>,
    ) -> Result<RescoreReport, UpdateError> {
        self.apply_updates(&[(Profile::Investment, investment), (Profile::Lifestyle, lifestyle)])
    }

    /// Drop persisted weights of `profile` and re-score with its defaults.
    pub fn reset_weights(&self, profile: Profile) -> Result<RescoreReport, UpdateError> {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        *phase = UpdatePhase::Persisting;
        let reset = self.engine.weights().reset_weights(profile);
        let result = match reset {
            Ok(_) => {
                *phase = UpdatePhase::Rescoring;
                Ok(self.rescore_all())
            }
            Err(e) => Err(e.into()),
        };
        *phase = UpdatePhase::Idle;
        result
    }

    fn apply_updates(
        &self,
        updates: &[(Profile, &BTreeMap<String, f64>)],
    ) -> Result<RescoreReport, UpdateError> {
        // Held for the whole update: one weight edit at a time.
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        let result = self.run_update(&mut phase, updates);
        *phase = UpdatePhase::Idle;
        result
    }

    fn run_update(
        &self,
        phase: &mut UpdatePhase,
        updates: &[(Profile, &BTreeMap<String, f64>)],
    ) -> Result<RescoreReport, UpdateError> {
        *phase = UpdatePhase::Validating;
        debug!(phase = ?*phase, profiles = updates.len(), "weight update");
        let mut validated = Vec::with_capacity(updates.len());
        let mut errors = Vec::new();
        for (profile, raw) in updates {
            match validate_weight_update(raw) {
                Ok(vector) => validated.push((*profile, bulk_normalize(&vector))),
                Err(problems) => {
                    errors.extend(problems.into_iter().map(|p| format!("{}: {}", profile, p)))
                }
            }
        }
        if !errors.is_empty() {
            return Err(UpdateError::Validation(errors));
        }

        *phase = UpdatePhase::Persisting;
        debug!(phase = ?*phase, "weight update");
        self.engine.weights().set_profiles(&validated)?;

        *phase = UpdatePhase::Rescoring;
        debug!(phase = ?*phase, "weight update");
        let report = self.rescore_all();
        info!(
            scored = report.scored,
            failed = report.failed.len(),
            complete = report.is_complete(),
            "weights applied"
        );
        Ok(report)
    }
}
