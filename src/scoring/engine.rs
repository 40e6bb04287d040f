use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use super::config::{CombinedMix, ScoringConfig, ScoringRules};
use super::criteria::{Criterion, Profile, SubScores, WeightVector};
use super::evaluators::{default_evaluators, evaluate_with, Evaluator, EvaluatorTable};
use super::normalize::{bulk_normalize, WEIGHT_TOLERANCE};
use super::validation::validate_scoring;
use crate::property::{Property, PropertyAttributes, PropertyScores};
use crate::weights::WeightStore;

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("{0} score is not a finite number")]
    NonFinite(&'static str),

    #[error("scoring panicked: {0}")]
    Panicked(String),
}

/// Score of one profile and the weights that produced it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProfileScore {
    pub score: f64,
    /// Normalized weights of the criteria that had data, zero weights excluded
    pub weights_used: WeightVector,
    /// Share of `score` contributed by each used criterion
    pub contributions: BTreeMap<Criterion, f64>,
}

/// Audit record of one scoring pass.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScoreBreakdown {
    pub subscores: SubScores,
    pub investment: ProfileScore,
    pub lifestyle: ProfileScore,
    pub combined_mix: CombinedMix,
    pub combined_score: f64,
    pub scored_at: DateTime<Utc>,
}

/// Weighted mean of the sub-scores that have data.
///
/// The weights are re-normalized first. Criteria without data or with zero
/// weight are skipped, and the result is divided by the weight mass that was
/// actually used. No usable criterion gives a score of 0 with empty
/// `weights_used`.
pub fn aggregate(subscores: &SubScores, weights: &WeightVector) -> ProfileScore {
    let weights = bulk_normalize(weights);

    let mut total = 0.0;
    let mut used_mass = 0.0;
    let mut weights_used = WeightVector::new();
    for (criterion, weight) in weights.iter() {
        if weight <= 0.0 {
            continue;
        }
        if let Some(score) = subscores.get(&criterion).and_then(|s| s.value()) {
            total += score * weight;
            used_mass += weight;
            weights_used.insert(criterion, weight);
        }
    }

    if used_mass <= 0.0 {
        return ProfileScore {
            score: 0.0,
            weights_used: WeightVector::new(),
            contributions: BTreeMap::new(),
        };
    }

    let contributions = weights_used
        .iter()
        .filter_map(|(criterion, weight)| {
            let score = subscores.get(&criterion)?.value()?;
            Some((criterion, score * weight / used_mass))
        })
        .collect();

    ProfileScore {
        score: (total / used_mass).clamp(0.0, 100.0),
        weights_used,
        contributions,
    }
}

impl CombinedMix {
    /// Blend the two profile scores.
    pub fn combine(&self, investment: f64, lifestyle: f64) -> f64 {
        (investment * self.investment + lifestyle * self.lifestyle).clamp(0.0, 100.0)
    }

    /// Rescale so both terms sum to 1.0. Unusable mixes fall back to the default.
    pub fn normalized(&self) -> CombinedMix {
        let valid = [self.investment, self.lifestyle]
            .iter()
            .all(|w| w.is_finite() && *w >= 0.0);
        let total = self.investment + self.lifestyle;
        if !valid || total <= 0.0 {
            warn!(
                investment = self.investment,
                lifestyle = self.lifestyle,
                "combined mix unusable, using default"
            );
            return CombinedMix::default();
        }
        if (total - 1.0).abs() > WEIGHT_TOLERANCE {
            warn!(total, "combined mix does not sum to 1.0, normalizing");
        }
        CombinedMix {
            investment: self.investment / total,
            lifestyle: self.lifestyle / total,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Multi-criteria scoring engine.
///
/// Reads weights from the shared [`WeightStore`] on every pass; thresholds
/// and the combined mix are fixed at construction.
pub struct ScoringEngine {
    weights: Arc<WeightStore>,
    rules: ScoringRules,
    mix: CombinedMix,
    evaluators: EvaluatorTable,
}

impl ScoringEngine {
    /// Build the engine, logging configuration problems instead of failing.
    pub fn new(config: &ScoringConfig, weights: Arc<WeightStore>) -> Self {
        if let Err(problems) = validate_scoring(config) {
            for problem in problems {
                warn!("scoring config: {}", problem);
            }
        }
        Self {
            weights,
            rules: config.rules(),
            mix: config.mix().normalized(),
            evaluators: default_evaluators(),
        }
    }

    /// Replace the evaluator used for `criterion`.
    pub fn with_evaluator(mut self, criterion: Criterion, evaluator: Evaluator) -> Self {
        self.evaluators.insert(criterion, evaluator);
        self
    }

    pub fn weights(&self) -> &WeightStore {
        &self.weights
    }

    pub fn mix(&self) -> CombinedMix {
        self.mix
    }

    pub fn rules(&self) -> &ScoringRules {
        &self.rules
    }

    /// Current (normalized) weights of `profile`.
    pub fn get_current_weights(&self, profile: Profile) -> WeightVector {
        bulk_normalize(&self.weights.get_weights(profile))
    }

    /// Score one profile from already computed sub-scores.
    pub fn score_profile(&self, subscores: &SubScores, profile: Profile) -> ProfileScore {
        let result = aggregate(subscores, &self.weights.get_weights(profile));
        if result.weights_used.is_empty() {
            warn!(%profile, "no criterion with data and weight for profile");
        }
        result
    }

    /// Full scoring pass over one attribute bundle.
    pub fn score_attributes(&self, attrs: &PropertyAttributes) -> Result<ScoreBreakdown, ScoringError> {
        let subscores = evaluate_with(&self.evaluators, attrs, &self.rules);
        let investment = self.score_profile(&subscores, Profile::Investment);
        let lifestyle = self.score_profile(&subscores, Profile::Lifestyle);
        let combined_score = self.mix.combine(investment.score, lifestyle.score);

        for (label, value) in [
            ("investment", investment.score),
            ("lifestyle", lifestyle.score),
            ("combined", combined_score),
        ] {
            if !value.is_finite() {
                return Err(ScoringError::NonFinite(label));
            }
        }

        Ok(ScoreBreakdown {
            subscores,
            investment,
            lifestyle,
            combined_mix: self.mix,
            combined_score,
            scored_at: Utc::now(),
        })
    }

    /// Score `property`, overwrite its score record, and return the combined score.
    ///
    /// Failures stay at the property boundary: they are logged and recorded
    /// as zero scores.
    pub fn calculate_score(&self, property: &mut Property) -> Result<f64, ScoringError> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.score_attributes(&property.attributes)
        }))
        .unwrap_or_else(|payload| Err(ScoringError::Panicked(panic_message(payload.as_ref()))));

        match outcome {
            Ok(breakdown) => {
                let scores = PropertyScores {
                    score_investment: round2(breakdown.investment.score),
                    score_lifestyle: round2(breakdown.lifestyle.score),
                    score_total: round2(breakdown.combined_score),
                    scored_at: breakdown.scored_at,
                    breakdown: Some(breakdown),
                };
                info!(
                    property_id = property.id,
                    investment = scores.score_investment,
                    lifestyle = scores.score_lifestyle,
                    combined = scores.score_total,
                    "scored property"
                );
                let total = scores.score_total;
                property.scores = Some(scores);
                Ok(total)
            }
            Err(e) => {
                error!(property_id = property.id, error = %e, "failed to score property");
                property.scores = Some(PropertyScores::failed());
                Err(e)
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic payload not string".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{EnvironmentFeatures, InvestmentMetrics, LandType};
    use crate::scoring::SubScore;

    fn subscores(pairs: &[(Criterion, SubScore)]) -> SubScores {
        let mut all: SubScores = Criterion::ALL.into_iter().map(|c| (c, SubScore::NoData)).collect();
        all.extend(pairs.iter().copied());
        all
    }

    fn vector(pairs: &[(Criterion, f64)]) -> WeightVector {
        pairs.iter().copied().collect()
    }

    fn engine_with(profiles: &[(Profile, WeightVector)]) -> ScoringEngine {
        let defaults = profiles.iter().cloned().collect();
        let store = Arc::new(WeightStore::in_memory(defaults));
        ScoringEngine::new(&ScoringConfig::default(), store)
    }

    #[test]
    fn test_renormalizes_over_available_criteria() {
        let weights = vector(&[(Criterion::InvestmentYield, 0.5), (Criterion::LocationQuality, 0.5)]);
        let scores = subscores(&[(Criterion::InvestmentYield, SubScore::Score(90.0))]);
        let result = aggregate(&scores, &weights);
        assert!((result.score - 90.0).abs() < 1e-9);
        assert_eq!(result.weights_used, vector(&[(Criterion::InvestmentYield, 0.5)]));
        assert!((result.contributions[&Criterion::InvestmentYield] - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_all_no_data_scores_zero() {
        let weights = vector(&[(Criterion::Transport, 0.4), (Criterion::Environment, 0.6)]);
        let result = aggregate(&subscores(&[]), &weights);
        assert_eq!(result.score, 0.0);
        assert!(result.weights_used.is_empty());
        assert!(result.contributions.is_empty());
    }

    #[test]
    fn test_empty_weights_score_zero() {
        let scores = subscores(&[(Criterion::Transport, SubScore::Score(70.0))]);
        let result = aggregate(&scores, &WeightVector::new());
        assert_eq!(result.score, 0.0);
        assert!(result.weights_used.is_empty());
    }

    #[test]
    fn test_zero_weight_criterion_ignored() {
        let weights = vector(&[(Criterion::Transport, 1.0), (Criterion::Environment, 0.0)]);
        let scores = subscores(&[
            (Criterion::Transport, SubScore::Score(40.0)),
            (Criterion::Environment, SubScore::Score(100.0)),
        ]);
        let result = aggregate(&scores, &weights);
        assert!((result.score - 40.0).abs() < 1e-9);
        assert!(result.weights_used.get(Criterion::Environment).is_none());
    }

    #[test]
    fn test_unnormalized_weights_are_normalized_first() {
        let weights = vector(&[(Criterion::Transport, 3.0), (Criterion::Environment, 1.0)]);
        let scores = subscores(&[
            (Criterion::Transport, SubScore::Score(80.0)),
            (Criterion::Environment, SubScore::Score(40.0)),
        ]);
        let result = aggregate(&scores, &weights);
        assert!((result.score - 70.0).abs() < 1e-9);
        assert!((result.weights_used.get(Criterion::Transport).unwrap() - 0.75).abs() < 1e-9);
        let contribution_sum: f64 = result.contributions.values().sum();
        assert!((contribution_sum - result.score).abs() < 1e-9);
    }

    #[test]
    fn test_combined_mix_example() {
        let mix = CombinedMix { investment: 0.32, lifestyle: 0.68 };
        assert!((mix.combine(80.0, 50.0) - 59.6).abs() < 1e-9);
    }

    #[test]
    fn test_mix_self_heals() {
        let mix = CombinedMix { investment: 1.0, lifestyle: 3.0 }.normalized();
        assert!((mix.investment - 0.25).abs() < 1e-9);
        assert!((mix.lifestyle - 0.75).abs() < 1e-9);

        let broken = CombinedMix { investment: -1.0, lifestyle: 0.5 }.normalized();
        assert_eq!(broken, CombinedMix::default());
    }

    #[test]
    fn test_score_profile_reads_store() {
        let engine = engine_with(&[(
            Profile::Investment,
            vector(&[(Criterion::InvestmentYield, 0.5), (Criterion::LocationQuality, 0.5)]),
        )]);
        let scores = subscores(&[
            (Criterion::InvestmentYield, SubScore::Score(90.0)),
            (Criterion::LocationQuality, SubScore::Score(50.0)),
        ]);
        let result = engine.score_profile(&scores, Profile::Investment);
        assert!((result.score - 70.0).abs() < 1e-9);

        // Profile without weights
        let result = engine.score_profile(&scores, Profile::Lifestyle);
        assert_eq!(result.score, 0.0);
        assert!(result.weights_used.is_empty());
    }

    #[test]
    fn test_calculate_score_writes_record() {
        let engine = engine_with(&[
            (Profile::Investment, vector(&[(Criterion::InvestmentYield, 1.0)])),
            (Profile::Lifestyle, vector(&[(Criterion::Environment, 1.0)])),
        ]);
        let mut property = Property::new(
            42,
            PropertyAttributes {
                // 7% yield -> 92.5
                investment: Some(InvestmentMetrics { rental_yield: Some(7.0), cap_rate: None }),
                // sea view + south -> 60
                environment: Some(EnvironmentFeatures {
                    sea_view: true,
                    orientation: Some("south".to_string()),
                    ..Default::default()
                }),
                land_type: Some(LandType::Buildable),
                ..Default::default()
            },
        );

        let combined = engine.calculate_score(&mut property).unwrap();
        let scores = property.scores.as_ref().unwrap();
        assert_eq!(scores.score_investment, 92.5);
        assert_eq!(scores.score_lifestyle, 60.0);
        // 92.5 * 0.32 + 60 * 0.68 = 29.6 + 40.8
        assert!((combined - 70.4).abs() < 1e-9);
        assert_eq!(scores.score_total, combined);

        let breakdown = scores.breakdown.as_ref().unwrap();
        assert_eq!(breakdown.subscores.len(), Criterion::ALL.len());
        assert_eq!(breakdown.subscores[&Criterion::Transport], SubScore::NoData);
        assert_eq!(breakdown.combined_mix, CombinedMix::default());
    }

    #[test]
    fn test_calculate_score_is_repeatable() {
        let engine = engine_with(&[
            (Profile::Investment, ScoringConfig::default().profile_defaults()[&Profile::Investment].clone()),
            (Profile::Lifestyle, ScoringConfig::default().profile_defaults()[&Profile::Lifestyle].clone()),
        ]);
        let mut property = Property::new(
            1,
            PropertyAttributes {
                area: Some(2_400.0),
                land_type: Some(LandType::Developed),
                ..Default::default()
            },
        );
        let first = engine.calculate_score(&mut property).unwrap();
        let first_record = property.scores.clone().unwrap();
        let second = engine.calculate_score(&mut property).unwrap();
        assert_eq!(first, second);
        let second_record = property.scores.unwrap();
        assert_eq!(first_record.score_investment, second_record.score_investment);
        assert_eq!(
            first_record.breakdown.unwrap().subscores,
            second_record.breakdown.unwrap().subscores
        );
    }

    #[test]
    fn test_breakdown_serializes_no_data_markers() {
        let engine = engine_with(&[]);
        let breakdown = engine.score_attributes(&PropertyAttributes::default()).unwrap();
        let json = serde_json::to_value(&breakdown).unwrap();
        assert_eq!(json["subscores"]["transport"], "no_data");
        assert_eq!(json["combined_score"], 0.0);
        let restored: ScoreBreakdown = serde_json::from_value(json).unwrap();
        assert_eq!(restored, breakdown);
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }

    fn panicking(_attrs: &PropertyAttributes, _rules: &ScoringRules) -> SubScore {
        panic!("evaluator exploded")
    }

    fn not_a_number(_attrs: &PropertyAttributes, _rules: &ScoringRules) -> SubScore {
        SubScore::Score(f64::NAN)
    }

    fn default_engine() -> ScoringEngine {
        let config = ScoringConfig::default();
        ScoringEngine::new(&config, Arc::new(WeightStore::in_memory(config.profile_defaults())))
    }

    #[test]
    fn test_panicking_evaluator_records_zero_scores() {
        let engine = default_engine().with_evaluator(Criterion::LegalStatus, panicking);
        let mut property = Property::new(3, PropertyAttributes::default());

        let err = engine.calculate_score(&mut property).unwrap_err();
        assert!(matches!(err, ScoringError::Panicked(ref msg) if msg.contains("evaluator exploded")));

        let scores = property.scores.unwrap();
        assert_eq!(scores.score_investment, 0.0);
        assert_eq!(scores.score_lifestyle, 0.0);
        assert_eq!(scores.score_total, 0.0);
        assert!(scores.breakdown.is_none());
    }

    #[test]
    fn test_non_finite_subscore_is_rejected() {
        let engine = default_engine().with_evaluator(Criterion::Transport, not_a_number);
        let mut property = Property::new(4, PropertyAttributes::default());

        let err = engine.calculate_score(&mut property).unwrap_err();
        assert!(matches!(err, ScoringError::NonFinite(_)));
        let scores = property.scores.unwrap();
        assert_eq!(scores.score_total, 0.0);
        assert!(scores.breakdown.is_none());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_subscore() -> impl Strategy<Value = SubScore> {
            prop_oneof![Just(SubScore::NoData), (0.0f64..=100.0).prop_map(SubScore::Score)]
        }

        proptest! {
            #[test]
            fn prop_profile_score_in_range(
                weights in prop::collection::vec(0.0f64..5.0, 10),
                scores in prop::collection::vec(arb_subscore(), 10),
            ) {
                let weights: WeightVector = Criterion::ALL.into_iter().zip(weights).collect();
                let scores: SubScores = Criterion::ALL.into_iter().zip(scores).collect();
                let result = aggregate(&scores, &weights);
                prop_assert!((0.0..=100.0).contains(&result.score));
                for (criterion, _) in result.weights_used.iter() {
                    prop_assert!(!scores[&criterion].is_no_data());
                }
            }

            #[test]
            fn prop_combined_is_convex(inv in 0.0f64..=100.0, life in 0.0f64..=100.0) {
                let combined = CombinedMix::default().combine(inv, life);
                prop_assert!(combined >= inv.min(life) - 1e-9);
                prop_assert!(combined <= inv.max(life) + 1e-9);
            }
        }
    }
}
