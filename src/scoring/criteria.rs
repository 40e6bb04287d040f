use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One independently evaluated scoring dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    InvestmentYield,
    LocationQuality,
    Transport,
    InfrastructureBasic,
    InfrastructureExtended,
    Environment,
    PhysicalCharacteristics,
    ServicesQuality,
    LegalStatus,
    DevelopmentPotential,
}

impl Criterion {
    pub const ALL: [Criterion; 10] = [
        Criterion::InvestmentYield,
        Criterion::LocationQuality,
        Criterion::Transport,
        Criterion::InfrastructureBasic,
        Criterion::InfrastructureExtended,
        Criterion::Environment,
        Criterion::PhysicalCharacteristics,
        Criterion::ServicesQuality,
        Criterion::LegalStatus,
        Criterion::DevelopmentPotential,
    ];

    /// Identifier used in config files, weight records and the CLI.
    pub fn name(self) -> &'static str {
        match self {
            Criterion::InvestmentYield => "investment_yield",
            Criterion::LocationQuality => "location_quality",
            Criterion::Transport => "transport",
            Criterion::InfrastructureBasic => "infrastructure_basic",
            Criterion::InfrastructureExtended => "infrastructure_extended",
            Criterion::Environment => "environment",
            Criterion::PhysicalCharacteristics => "physical_characteristics",
            Criterion::ServicesQuality => "services_quality",
            Criterion::LegalStatus => "legal_status",
            Criterion::DevelopmentPotential => "development_potential",
        }
    }

    /// Human-readable label for terminal output.
    pub fn label(self) -> &'static str {
        match self {
            Criterion::InvestmentYield => "Investment yield",
            Criterion::LocationQuality => "Location quality",
            Criterion::Transport => "Transport",
            Criterion::InfrastructureBasic => "Basic infrastructure",
            Criterion::InfrastructureExtended => "Extended infrastructure",
            Criterion::Environment => "Environment",
            Criterion::PhysicalCharacteristics => "Physical characteristics",
            Criterion::ServicesQuality => "Services quality",
            Criterion::LegalStatus => "Legal status",
            Criterion::DevelopmentPotential => "Development potential",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Criterion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Criterion::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown criterion '{}'", s))
    }
}

/// A named evaluation perspective owning one weight vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    Investment,
    Lifestyle,
    /// Single-vector profile kept for older weight records.
    Combined,
}

impl Profile {
    pub const ALL: [Profile; 3] = [Profile::Investment, Profile::Lifestyle, Profile::Combined];

    pub fn name(self) -> &'static str {
        match self {
            Profile::Investment => "investment",
            Profile::Lifestyle => "lifestyle",
            Profile::Combined => "combined",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Profile::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown profile '{}' (expected investment, lifestyle or combined)", s))
    }
}

/// Result of one criterion evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubScore {
    Score(f64),
    NoData,
}

impl SubScore {
    /// Clamp into [0, 100]. Non-finite values carry no information and become `NoData`.
    pub fn clamped(value: f64) -> Self {
        if value.is_finite() {
            SubScore::Score(value.clamp(0.0, 100.0))
        } else {
            SubScore::NoData
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            SubScore::Score(v) => Some(v),
            SubScore::NoData => None,
        }
    }

    pub fn is_no_data(self) -> bool {
        matches!(self, SubScore::NoData)
    }
}

impl From<Option<f64>> for SubScore {
    fn from(value: Option<f64>) -> Self {
        value.map_or(SubScore::NoData, SubScore::clamped)
    }
}

/// Sub-scores for every criterion of one property.
pub type SubScores = BTreeMap<Criterion, SubScore>;

/// Criterion -> weight mapping for one profile.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct WeightVector(BTreeMap<Criterion, f64>);

impl WeightVector {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, criterion: Criterion) -> Option<f64> {
        self.0.get(&criterion).copied()
    }

    pub fn insert(&mut self, criterion: Criterion, weight: f64) -> Option<f64> {
        self.0.insert(criterion, weight)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Criterion, f64)> + '_ {
        self.0.iter().map(|(c, w)| (*c, *w))
    }

    pub fn criteria(&self) -> impl Iterator<Item = Criterion> + '_ {
        self.0.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    /// Build a vector from raw `name -> weight` pairs.
    /// Returns every unknown name at once.
    pub fn from_named<'a, I>(pairs: I) -> Result<Self, Vec<String>>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut vector = WeightVector::new();
        let mut errors = Vec::new();
        for (name, weight) in pairs {
            match name.parse::<Criterion>() {
                Ok(criterion) => {
                    vector.insert(criterion, weight);
                }
                Err(e) => errors.push(e),
            }
        }
        if errors.is_empty() {
            Ok(vector)
        } else {
            Err(errors)
        }
    }
}

impl FromIterator<(Criterion, f64)> for WeightVector {
    fn from_iter<T: IntoIterator<Item = (Criterion, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
