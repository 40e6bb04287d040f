use std::cmp::Ordering;

use crate::property::{Property, PropertyScores};
use crate::scoring::Profile;

/// A scored property with the score it is ranked by.
#[derive(Debug, Clone, Copy)]
pub struct RankedProperty<'a> {
    pub property: &'a Property,
    pub score: f64,
}

/// Published score of `profile`; `Combined` ranks by the blended total.
pub fn profile_score(scores: &PropertyScores, profile: Profile) -> f64 {
    match profile {
        Profile::Investment => scores.score_investment,
        Profile::Lifestyle => scores.score_lifestyle,
        Profile::Combined => scores.score_total,
    }
}

/// Scored properties ordered best first, ties broken by ascending id.
/// Unscored properties and scores below `min_score` are left out.
pub fn rank(properties: &[Property], profile: Profile, min_score: Option<f64>) -> Vec<RankedProperty<'_>> {
    let mut ranked: Vec<RankedProperty> = properties
        .iter()
        .filter_map(|property| {
            let scores = property.scores.as_ref()?;
            Some(RankedProperty {
                property,
                score: profile_score(scores, profile),
            })
        })
        .filter(|r| min_score.map_or(true, |min| r.score >= min))
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.property.id.cmp(&b.property.id))
    });
    ranked
}
