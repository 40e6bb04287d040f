use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::criteria::{Criterion, Profile, WeightVector};

/// Main scoring configuration.
///
/// Every section is optional; a missing section falls back to the compiled
/// defaults. Criterion names are kept as strings here so startup validation
/// can report unknown names instead of failing the YAML parse.
///
/// Example YAML:
/// ```yaml
/// scoring:
///   combined_mix: { investment: 0.32, lifestyle: 0.68 }
///   profiles:
///     investment:
///       investment_yield: 0.5
///       location_quality: 0.5
///   rules:
///     distance_bands:
///       - { max_distance: 2000, multiplier: 1.0 }
///       - { multiplier: 0.2 }
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScoringConfig {
    /// Fixed blend of the investment and lifestyle scores
    #[serde(default)]
    pub combined_mix: Option<CombinedMix>,

    /// Default weight vectors per profile, used when no weights are persisted
    #[serde(default)]
    pub profiles: Option<BTreeMap<Profile, BTreeMap<String, f64>>>,

    /// Thresholds used by the criterion evaluators
    #[serde(default)]
    pub rules: Option<ScoringRules>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            combined_mix: Some(CombinedMix::default()),
            profiles: Some(default_profiles()),
            rules: Some(ScoringRules::default()),
        }
    }
}

impl ScoringConfig {
    /// Default vectors per profile with unknown criterion names dropped.
    /// Profiles missing from the config keep their compiled defaults.
    pub fn profile_defaults(&self) -> BTreeMap<Profile, WeightVector> {
        let mut merged = default_profiles();
        if let Some(ref overrides) = self.profiles {
            for (profile, weights) in overrides {
                merged.insert(*profile, weights.clone());
            }
        }
        merged
            .into_iter()
            .map(|(profile, weights)| {
                let vector = weights
                    .iter()
                    .filter_map(|(name, w)| name.parse::<Criterion>().ok().map(|c| (c, *w)))
                    .collect();
                (profile, vector)
            })
            .collect()
    }

    pub fn mix(&self) -> CombinedMix {
        self.combined_mix.unwrap_or_default()
    }

    pub fn rules(&self) -> ScoringRules {
        self.rules.clone().unwrap_or_default()
    }
}

/// Two-term convex combination of the profile scores.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CombinedMix {
    pub investment: f64,
    pub lifestyle: f64,
}

impl Default for CombinedMix {
    fn default() -> Self {
        Self {
            investment: 0.32,
            lifestyle: 0.68,
        }
    }
}

fn default_profiles() -> BTreeMap<Profile, BTreeMap<String, f64>> {
    let named = |pairs: &[(Criterion, f64)]| -> BTreeMap<String, f64> {
        pairs.iter().map(|(c, w)| (c.name().to_string(), *w)).collect()
    };

    let mut profiles = BTreeMap::new();
    profiles.insert(
        Profile::Investment,
        named(&[
            (Criterion::InvestmentYield, 0.35),
            (Criterion::LocationQuality, 0.20),
            (Criterion::LegalStatus, 0.10),
            (Criterion::Transport, 0.10),
            (Criterion::InfrastructureBasic, 0.10),
            (Criterion::DevelopmentPotential, 0.08),
            (Criterion::PhysicalCharacteristics, 0.05),
            (Criterion::InfrastructureExtended, 0.02),
            (Criterion::ServicesQuality, 0.00),
            (Criterion::Environment, 0.00),
        ]),
    );
    profiles.insert(
        Profile::Lifestyle,
        named(&[
            (Criterion::Environment, 0.22),
            (Criterion::LocationQuality, 0.20),
            (Criterion::ServicesQuality, 0.18),
            (Criterion::Transport, 0.12),
            (Criterion::InfrastructureExtended, 0.10),
            (Criterion::InfrastructureBasic, 0.08),
            (Criterion::PhysicalCharacteristics, 0.05),
            (Criterion::LegalStatus, 0.03),
            (Criterion::DevelopmentPotential, 0.02),
            (Criterion::InvestmentYield, 0.00),
        ]),
    );
    profiles.insert(
        Profile::Combined,
        named(&[
            (Criterion::InvestmentYield, 0.20),
            (Criterion::LocationQuality, 0.16),
            (Criterion::Transport, 0.12),
            (Criterion::InfrastructureBasic, 0.16),
            (Criterion::InfrastructureExtended, 0.08),
            (Criterion::Environment, 0.08),
            (Criterion::PhysicalCharacteristics, 0.04),
            (Criterion::ServicesQuality, 0.08),
            (Criterion::LegalStatus, 0.04),
            (Criterion::DevelopmentPotential, 0.04),
        ]),
    );
    profiles
}

/// Numeric policies of the criterion evaluators.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScoringRules {
    /// Yield percentage -> score bands
    #[serde(default)]
    pub yield_bands: YieldBands,

    /// Distance (meters) -> multiplier bands, checked in order
    /// The last band may omit `max_distance` to catch everything beyond
    #[serde(default = "default_distance_bands")]
    pub distance_bands: Vec<DistanceBand>,

    /// Description keywords that reveal a basic utility
    #[serde(default = "default_infrastructure_keywords")]
    pub infrastructure_keywords: InfrastructureKeywords,

    /// Description keywords that hint at development upside
    #[serde(default = "default_development_keywords")]
    pub development_keywords: Vec<String>,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            yield_bands: YieldBands::default(),
            distance_bands: default_distance_bands(),
            infrastructure_keywords: default_infrastructure_keywords(),
            development_keywords: default_development_keywords(),
        }
    }
}

impl ScoringRules {
    /// Multiplier of the first band containing `distance`.
    /// Falls back to the last band's multiplier.
    pub fn distance_multiplier(&self, distance: f64) -> f64 {
        self.distance_bands
            .iter()
            .find(|band| band.max_distance.map_or(true, |max| distance <= max))
            .or(self.distance_bands.last())
            .map_or(0.0, |band| band.multiplier)
    }

    /// Score of a yield percentage.
    pub fn yield_score(&self, yield_pct: f64) -> f64 {
        let bands = &self.yield_bands;
        if yield_pct >= bands.excellent_min {
            (bands.excellent_base + (yield_pct - bands.excellent_min) * bands.excellent_multiplier)
                .min(100.0)
        } else if yield_pct >= bands.good_min {
            bands.good_score
        } else if yield_pct >= bands.fair_min {
            bands.fair_score
        } else {
            bands.poor_score
        }
    }
}

/// Yield thresholds in percent.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct YieldBands {
    pub excellent_min: f64,
    pub excellent_base: f64,
    pub excellent_multiplier: f64,
    pub good_min: f64,
    pub good_score: f64,
    pub fair_min: f64,
    pub fair_score: f64,
    pub poor_score: f64,
}

impl Default for YieldBands {
    fn default() -> Self {
        Self {
            excellent_min: 6.0,
            excellent_base: 90.0,
            excellent_multiplier: 2.5,
            good_min: 4.0,
            good_score: 75.0,
            fair_min: 2.0,
            fair_score: 50.0,
            poor_score: 20.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DistanceBand {
    #[serde(default)]
    pub max_distance: Option<f64>,
    pub multiplier: f64,
}

fn default_distance_bands() -> Vec<DistanceBand> {
    vec![
        DistanceBand { max_distance: Some(2_000.0), multiplier: 1.0 },
        DistanceBand { max_distance: Some(5_000.0), multiplier: 0.7 },
        DistanceBand { max_distance: Some(10_000.0), multiplier: 0.4 },
        DistanceBand { max_distance: None, multiplier: 0.2 },
    ]
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct InfrastructureKeywords {
    pub electricity: Vec<String>,
    pub water: Vec<String>,
    pub internet: Vec<String>,
    pub gas: Vec<String>,
}

fn strings(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

fn default_infrastructure_keywords() -> InfrastructureKeywords {
    InfrastructureKeywords {
        electricity: strings(&["electricidad", "luz", "eléctrico", "corriente", "electricity"]),
        water: strings(&["agua", "suministro agua", "abastecimiento", "red agua", "water"]),
        internet: strings(&["internet", "fibra", "adsl", "wifi", "banda ancha"]),
        gas: strings(&["gas", "butano", "propano", "gas natural"]),
    }
}

fn default_development_keywords() -> Vec<String> {
    strings(&["edificable", "segregable", "licencia", "proyecto", "building permit"])
}
