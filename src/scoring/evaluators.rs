use std::collections::BTreeMap;

use tracing::debug;

use super::config::ScoringRules;
use super::criteria::{Criterion, SubScore, SubScores};
use crate::property::{LandType, Level, PropertyAttributes};

/// Uniform signature of every criterion evaluator.
pub type Evaluator = fn(&PropertyAttributes, &ScoringRules) -> SubScore;

/// Evaluator registered for `criterion`.
pub fn evaluator(criterion: Criterion) -> Evaluator {
    match criterion {
        Criterion::InvestmentYield => investment_yield,
        Criterion::LocationQuality => location_quality,
        Criterion::Transport => transport,
        Criterion::InfrastructureBasic => infrastructure_basic,
        Criterion::InfrastructureExtended => infrastructure_extended,
        Criterion::Environment => environment,
        Criterion::PhysicalCharacteristics => physical_characteristics,
        Criterion::ServicesQuality => services_quality,
        Criterion::LegalStatus => legal_status,
        Criterion::DevelopmentPotential => development_potential,
    }
}

/// Evaluator per criterion, as used by the engine.
pub type EvaluatorTable = BTreeMap<Criterion, Evaluator>;

/// The registered evaluator of every criterion.
pub fn default_evaluators() -> EvaluatorTable {
    Criterion::ALL.into_iter().map(|c| (c, evaluator(c))).collect()
}

/// Run all ten registered evaluators. Every criterion is present in the result.
pub fn evaluate_all(attrs: &PropertyAttributes, rules: &ScoringRules) -> SubScores {
    evaluate_with(&default_evaluators(), attrs, rules)
}

/// Run `table`, falling back to the registry for criteria it lacks.
pub fn evaluate_with(table: &EvaluatorTable, attrs: &PropertyAttributes, rules: &ScoringRules) -> SubScores {
    Criterion::ALL
        .into_iter()
        .map(|criterion| {
            let eval = table.get(&criterion).copied().unwrap_or_else(|| evaluator(criterion));
            let score = eval(attrs, rules);
            match score {
                SubScore::Score(v) => debug!(%criterion, score = v, "criterion scored"),
                SubScore::NoData => debug!(%criterion, "criterion has no data"),
            }
            (criterion, score)
        })
        .collect()
}

/// Rental yield and cap rate through the yield bands, 60/40 over whichever are known.
pub fn investment_yield(attrs: &PropertyAttributes, rules: &ScoringRules) -> SubScore {
    let Some(ref metrics) = attrs.investment else {
        return SubScore::NoData;
    };

    let parts = [(metrics.rental_yield, 0.6), (metrics.cap_rate, 0.4)];
    let mut total = 0.0;
    let mut weight_sum = 0.0;
    for (value, weight) in parts {
        if let Some(v) = value.filter(|v| v.is_finite()) {
            total += rules.yield_score(v) * weight;
            weight_sum += weight;
        }
    }

    if weight_sum > 0.0 {
        SubScore::clamped(total / weight_sum)
    } else {
        SubScore::NoData
    }
}

pub fn location_quality(attrs: &PropertyAttributes, _rules: &ScoringRules) -> SubScore {
    let city_minutes = attrs
        .travel_times
        .as_ref()
        .and_then(|t| t.nearest_city_minutes);
    let hood_known = attrs.neighborhood.as_ref().is_some_and(|h| {
        h.area_price_level.is_some() || h.new_houses.is_some() || h.noise_level.is_some()
    });
    if !hood_known && city_minutes.is_none() {
        return SubScore::NoData;
    }

    let mut score = 0.0;
    if let Some(ref hood) = attrs.neighborhood {
        score += match hood.area_price_level {
            Some(Level::High) => 40.0,
            Some(Level::Medium) => 25.0,
            Some(Level::Low) => 10.0,
            None => 0.0,
        };
        if hood.new_houses == Some(true) {
            score += 15.0;
        }
        score += match hood.noise_level {
            Some(Level::Low) => 15.0,
            Some(Level::Medium) => 5.0,
            _ => 0.0,
        };
    }

    if let Some(minutes) = city_minutes {
        score += if minutes <= 15.0 {
            30.0
        } else if minutes <= 30.0 {
            20.0
        } else if minutes <= 45.0 {
            10.0
        } else {
            0.0
        };
    }

    SubScore::clamped(score)
}

pub fn transport(attrs: &PropertyAttributes, rules: &ScoringRules) -> SubScore {
    let Some(ref t) = attrs.transport else {
        return SubScore::NoData;
    };

    let hubs = [
        (t.train_station_distance, 30.0),
        (t.bus_station_distance, 20.0),
        (t.airport_distance, 25.0),
        (t.highway_distance, 25.0),
    ];
    if hubs.iter().all(|(distance, _)| distance.is_none()) {
        return SubScore::NoData;
    }

    let score: f64 = hubs
        .iter()
        .filter_map(|(distance, points)| distance.map(|d| points * rules.distance_multiplier(d)))
        .sum();

    SubScore::clamped(score)
}

/// Share of the four basic utilities available, with description keywords
/// filling in utilities the flags don't confirm.
pub fn infrastructure_basic(attrs: &PropertyAttributes, rules: &ScoringRules) -> SubScore {
    let description = attrs.description.as_deref().unwrap_or_default().to_lowercase();
    let keywords = &rules.infrastructure_keywords;
    let flags = attrs.infrastructure_basic.as_ref();

    let utilities = [
        (flags.and_then(|f| f.electricity), &keywords.electricity),
        (flags.and_then(|f| f.water), &keywords.water),
        (flags.and_then(|f| f.internet), &keywords.internet),
        (flags.and_then(|f| f.gas), &keywords.gas),
    ];

    let mut available = 0usize;
    let mut keyword_hit = false;
    for (flag, words) in utilities {
        if flag == Some(true) {
            available += 1;
        } else if words.iter().any(|w| description.contains(&w.to_lowercase())) {
            available += 1;
            keyword_hit = true;
        }
    }

    let flag_known = utilities.iter().any(|(flag, _)| flag.is_some());
    if !flag_known && !keyword_hit {
        return SubScore::NoData;
    }

    SubScore::clamped(available as f64 / utilities.len() as f64 * 100.0)
}

pub fn infrastructure_extended(attrs: &PropertyAttributes, rules: &ScoringRules) -> SubScore {
    let Some(ref ext) = attrs.infrastructure_extended else {
        return SubScore::NoData;
    };

    let amenities = [
        (ext.supermarket_distance, 25.0),
        (ext.school_distance, 25.0),
        (ext.hospital_distance, 25.0),
        (ext.restaurant_distance, 15.0),
        (ext.cafe_distance, 10.0),
    ];
    if amenities.iter().all(|(distance, _)| distance.is_none()) {
        return SubScore::NoData;
    }

    let score: f64 = amenities
        .iter()
        .filter_map(|(distance, points)| distance.map(|d| points * rules.distance_multiplier(d)))
        .sum();

    SubScore::clamped(score)
}

pub fn environment(attrs: &PropertyAttributes, _rules: &ScoringRules) -> SubScore {
    let Some(ref env) = attrs.environment else {
        return SubScore::NoData;
    };

    let mut score = 0.0;
    if env.sea_view {
        score += 40.0;
    }
    if env.mountain_view {
        score += 30.0;
    }
    if env.forest_view {
        score += 20.0;
    }

    // Compound directions first so "southeast" isn't read as "south".
    const ORIENTATION: [(&str, f64); 6] = [
        ("southeast", 15.0),
        ("southwest", 15.0),
        ("south", 20.0),
        ("east", 10.0),
        ("west", 10.0),
        ("north", 0.0),
    ];
    if let Some(ref orientation) = env.orientation {
        let orientation = orientation.to_lowercase().replace(['-', ' '], "");
        if let Some((_, points)) = ORIENTATION.iter().find(|(dir, _)| orientation.contains(dir)) {
            score += points;
        }
    }

    SubScore::clamped(score)
}

pub fn physical_characteristics(attrs: &PropertyAttributes, _rules: &ScoringRules) -> SubScore {
    let area = attrs.area.filter(|a| *a > 0.0);
    if area.is_none() && attrs.land_type.is_none() {
        return SubScore::NoData;
    }

    let mut score = 0.0;
    if let Some(area) = area {
        score += if area >= 5_000.0 {
            50.0
        } else if area >= 2_000.0 {
            40.0
        } else if area >= 1_000.0 {
            30.0
        } else if area >= 500.0 {
            20.0
        } else {
            10.0
        };

        if let Some(price) = attrs.price.filter(|p| *p > 0.0) {
            let per_m2 = price / area;
            if per_m2 <= 30.0 {
                score += 20.0;
            } else if per_m2 <= 60.0 {
                score += 10.0;
            }
        }
    }

    score += match attrs.land_type {
        Some(LandType::Buildable) => 30.0,
        Some(LandType::Developed) => 20.0,
        None => 0.0,
    };

    SubScore::clamped(score)
}

/// Mean rating on a 0-5 scale, scaled to 0-100.
pub fn services_quality(attrs: &PropertyAttributes, _rules: &ScoringRules) -> SubScore {
    let Some(ref ratings) = attrs.services_quality else {
        return SubScore::NoData;
    };

    let known: Vec<f64> = [
        ratings.school_avg_rating,
        ratings.restaurant_avg_rating,
        ratings.cafe_avg_rating,
    ]
    .into_iter()
    .flatten()
    .filter(|r| r.is_finite())
    .map(|r| r.clamp(0.0, 5.0))
    .collect();

    if known.is_empty() {
        return SubScore::NoData;
    }

    let mean = known.iter().sum::<f64>() / known.len() as f64;
    SubScore::clamped(mean * 20.0)
}

pub fn legal_status(attrs: &PropertyAttributes, _rules: &ScoringRules) -> SubScore {
    let status = attrs
        .legal_status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let score = match (status, attrs.land_type) {
        (Some(status), _) => {
            // "urbanizable" must be checked before "urban".
            if status.contains("urbanizable") || status.contains("buildable") {
                75.0
            } else if status.contains("urban") || status.contains("developed") {
                100.0
            } else if status.contains("rústic") || status.contains("rustic") {
                30.0
            } else {
                50.0
            }
        }
        (None, Some(LandType::Developed)) => 100.0,
        (None, Some(LandType::Buildable)) => 75.0,
        (None, None) => return SubScore::NoData,
    };

    SubScore::clamped(score)
}

pub fn development_potential(attrs: &PropertyAttributes, rules: &ScoringRules) -> SubScore {
    let area = attrs.area.filter(|a| *a > 0.0);
    if area.is_none() && attrs.land_type.is_none() {
        return SubScore::NoData;
    }

    let mut score = match attrs.land_type {
        Some(LandType::Buildable) => 60.0,
        Some(LandType::Developed) => 40.0,
        None => 30.0,
    };

    if let Some(area) = area {
        if area >= 2_000.0 {
            score += 20.0;
        } else if area >= 1_000.0 {
            score += 10.0;
        }
    }

    let description = attrs.description.as_deref().unwrap_or_default().to_lowercase();
    let hits = rules
        .development_keywords
        .iter()
        .filter(|k| description.contains(&k.to_lowercase()))
        .count();
    score += hits as f64 * 10.0;

    SubScore::clamped(score)
}
