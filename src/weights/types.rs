use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scoring::{Criterion, Profile, WeightVector};

pub const WEIGHTS_STATE_VERSION: u32 = 1;

/// Persisted weight records for every profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightState {
    pub version: u32,
    #[serde(default)]
    pub records: Vec<WeightRecord>,
}

/// One `(criterion, profile, weight, active)` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightRecord {
    pub criterion: Criterion,
    pub profile: Profile,
    pub weight: f64,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

impl Default for WeightState {
    fn default() -> Self {
        Self::new()
    }
}

impl WeightState {
    pub fn new() -> Self {
        Self {
            version: WEIGHTS_STATE_VERSION,
            records: Vec::new(),
        }
    }

    /// Active weights persisted for `profile`, if any.
    pub fn active_vector(&self, profile: Profile) -> Option<WeightVector> {
        let vector: WeightVector = self
            .records
            .iter()
            .filter(|r| r.profile == profile && r.active)
            .map(|r| (r.criterion, r.weight))
            .collect();
        if vector.is_empty() {
            None
        } else {
            Some(vector)
        }
    }

    /// Replace every record of `profile` with `vector`, all marked active.
    pub fn replace_profile(&mut self, profile: Profile, vector: &WeightVector) {
        let now = Utc::now();
        self.records.retain(|r| r.profile != profile);
        self.records.extend(vector.iter().map(|(criterion, weight)| WeightRecord {
            criterion,
            profile,
            weight,
            active: true,
            updated_at: now,
        }));
    }

    /// Mark every record of `profile` inactive.
    /// Returns true if any active record was changed.
    pub fn deactivate_profile(&mut self, profile: Profile) -> bool {
        let now = Utc::now();
        let mut changed = false;
        for record in self.records.iter_mut().filter(|r| r.profile == profile && r.active) {
            record.active = false;
            record.updated_at = now;
            changed = true;
        }
        changed
    }
}
