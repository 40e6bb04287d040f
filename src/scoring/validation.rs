use std::collections::BTreeMap;

use super::config::ScoringConfig;
use super::criteria::{Criterion, WeightVector};
use super::normalize::WEIGHT_TOLERANCE;

/// Check the scoring configuration.
/// Returns all problems at once (not just the first). The engine repairs
/// every one of them on the fly, so callers report them as warnings.
pub fn validate_scoring(config: &ScoringConfig) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if let Some(ref mix) = config.combined_mix {
        if mix.investment < 0.0 || mix.lifestyle < 0.0 {
            errors.push("scoring.combined_mix: weights must be non-negative".to_string());
        }
        let total = mix.investment + mix.lifestyle;
        if (total - 1.0).abs() > WEIGHT_TOLERANCE {
            errors.push(format!("scoring.combined_mix: weights sum to {:.4}, expected 1.0", total));
        }
    }

    if let Some(ref profiles) = config.profiles {
        for (profile, weights) in profiles {
            let mut total = 0.0;
            for (name, weight) in weights {
                if let Err(e) = name.parse::<Criterion>() {
                    errors.push(format!("scoring.profiles.{}: {}", profile, e));
                    continue;
                }
                if !weight.is_finite() || *weight < 0.0 {
                    errors.push(format!(
                        "scoring.profiles.{}.{}: weight must be non-negative (got {})",
                        profile, name, weight
                    ));
                    continue;
                }
                total += weight;
            }
            if (total - 1.0).abs() > WEIGHT_TOLERANCE {
                errors.push(format!(
                    "scoring.profiles.{}: weights sum to {:.4}, expected 1.0",
                    profile, total
                ));
            }
        }
    }

    if let Some(ref rules) = config.rules {
        if rules.distance_bands.is_empty() {
            errors.push("scoring.rules.distance_bands: at least one band is required".to_string());
        }
        let mut previous = f64::NEG_INFINITY;
        for (i, band) in rules.distance_bands.iter().enumerate() {
            if band.multiplier < 0.0 {
                errors.push(format!(
                    "scoring.rules.distance_bands[{}].multiplier: must be non-negative",
                    i
                ));
            }
            match band.max_distance {
                Some(max) if max <= previous => errors.push(format!(
                    "scoring.rules.distance_bands[{}].max_distance: bands must be in ascending order",
                    i
                )),
                Some(max) => previous = max,
                None if i + 1 != rules.distance_bands.len() => errors.push(format!(
                    "scoring.rules.distance_bands[{}]: only the last band may omit max_distance",
                    i
                )),
                None => {}
            }
        }

        let bands = &rules.yield_bands;
        if !(bands.fair_min <= bands.good_min && bands.good_min <= bands.excellent_min) {
            errors.push(
                "scoring.rules.yield_bands: expected fair_min <= good_min <= excellent_min".to_string(),
            );
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a user-supplied `name -> weight` map before anything is persisted.
/// Returns every problem at once.
pub fn validate_weight_update(raw: &BTreeMap<String, f64>) -> Result<WeightVector, Vec<String>> {
    let mut errors = Vec::new();

    if raw.is_empty() {
        errors.push("no weights given".to_string());
    }

    for (name, weight) in raw {
        if !weight.is_finite() {
            errors.push(format!("{}: weight must be a finite number", name));
        } else if *weight < 0.0 {
            errors.push(format!("{}: weight must be non-negative (got {})", name, weight));
        }
    }

    let vector = match WeightVector::from_named(raw.iter().map(|(k, v)| (k.as_str(), *v))) {
        Ok(vector) => Some(vector),
        Err(unknown) => {
            errors.extend(unknown);
            None
        }
    };

    match vector {
        Some(vector) if errors.is_empty() => Ok(vector),
        _ => Err(errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{CombinedMix, DistanceBand, Profile, ScoringRules};

    fn raw(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_scoring(&ScoringConfig::default()).is_ok());
    }

    #[test]
    fn test_empty_config() {
        let config = ScoringConfig {
            combined_mix: None,
            profiles: None,
            rules: None,
        };
        assert!(validate_scoring(&config).is_ok());
    }

    #[test]
    fn test_mix_not_summing_to_one() {
        let config = ScoringConfig {
            combined_mix: Some(CombinedMix { investment: 0.5, lifestyle: 0.6 }),
            profiles: None,
            rules: None,
        };
        let errors = validate_scoring(&config).unwrap_err();
        assert!(errors[0].contains("scoring.combined_mix"));
    }

    #[test]
    fn test_profile_problems_all_reported() {
        let mut profiles = BTreeMap::new();
        profiles.insert(Profile::Investment, raw(&[("investment_yield", 0.7), ("views", 0.3)]));
        profiles.insert(Profile::Lifestyle, raw(&[("environment", -0.5), ("transport", 1.0)]));
        let config = ScoringConfig {
            combined_mix: None,
            profiles: Some(profiles),
            rules: None,
        };
        let errors = validate_scoring(&config).unwrap_err();
        // unknown name + investment sum 0.7 + negative weight
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("views")));
        assert!(errors.iter().any(|e| e.contains("scoring.profiles.lifestyle.environment")));
    }

    #[test]
    fn test_distance_bands_out_of_order() {
        let config = ScoringConfig {
            combined_mix: None,
            profiles: None,
            rules: Some(ScoringRules {
                distance_bands: vec![
                    DistanceBand { max_distance: Some(5_000.0), multiplier: 0.7 },
                    DistanceBand { max_distance: None, multiplier: 0.2 },
                    DistanceBand { max_distance: Some(2_000.0), multiplier: -1.0 },
                ],
                ..ScoringRules::default()
            }),
        };
        let errors = validate_scoring(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_weight_update_valid() {
        let vector = validate_weight_update(&raw(&[("transport", 2.0), ("environment", 0.0)])).unwrap();
        assert_eq!(vector.get(Criterion::Transport), Some(2.0));
        assert_eq!(vector.get(Criterion::Environment), Some(0.0));
    }

    #[test]
    fn test_weight_update_collects_all_errors() {
        let errors = validate_weight_update(&raw(&[
            ("transport", -0.1),
            ("views", 0.5),
            ("environment", f64::NAN),
        ]))
        .unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_weight_update_empty() {
        assert!(validate_weight_update(&BTreeMap::new()).is_err());
    }
}
