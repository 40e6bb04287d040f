use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scoring::ScoreBreakdown;

/// A land listing together with its enrichment data and published scores.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Property {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub municipality: Option<String>,
    #[serde(flatten)]
    pub attributes: PropertyAttributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<PropertyScores>,
}

impl Property {
    pub fn new(id: u64, attributes: PropertyAttributes) -> Self {
        Self {
            id,
            title: None,
            url: None,
            municipality: None,
            attributes,
            scores: None,
        }
    }

    /// Title for display, falling back to the id
    pub fn display_title(&self) -> String {
        match self.title.as_deref() {
            Some(t) if !t.trim().is_empty() => t.trim().to_string(),
            _ => format!("Property #{}", self.id),
        }
    }
}

/// Enriched evidence consumed by the criterion evaluators.
/// Any absent field means "no data" for the evaluators reading it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PropertyAttributes {
    /// Asking price in euros
    pub price: Option<f64>,
    /// Plot area in square meters
    pub area: Option<f64>,
    pub land_type: Option<LandType>,
    pub description: Option<String>,
    /// Free-text zoning classification, e.g. "Urbano", "Rústico"
    pub legal_status: Option<String>,
    pub infrastructure_basic: Option<BasicInfrastructure>,
    pub infrastructure_extended: Option<ExtendedInfrastructure>,
    pub transport: Option<TransportAccess>,
    pub environment: Option<EnvironmentFeatures>,
    pub neighborhood: Option<Neighborhood>,
    pub services_quality: Option<ServiceRatings>,
    pub travel_times: Option<TravelTimes>,
    pub investment: Option<InvestmentMetrics>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LandType {
    Developed,
    Buildable,
}

/// Utility availability flags. `None` means unknown.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BasicInfrastructure {
    pub electricity: Option<bool>,
    pub water: Option<bool>,
    pub internet: Option<bool>,
    pub gas: Option<bool>,
}

/// Distance in meters to the nearest amenity of each kind.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtendedInfrastructure {
    pub supermarket_distance: Option<f64>,
    pub school_distance: Option<f64>,
    pub hospital_distance: Option<f64>,
    pub restaurant_distance: Option<f64>,
    pub cafe_distance: Option<f64>,
}

/// Distance in meters to the nearest transport hub of each kind.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportAccess {
    pub train_station_distance: Option<f64>,
    pub bus_station_distance: Option<f64>,
    pub airport_distance: Option<f64>,
    pub highway_distance: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EnvironmentFeatures {
    pub sea_view: bool,
    pub mountain_view: bool,
    pub forest_view: bool,
    pub orientation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Neighborhood {
    pub area_price_level: Option<Level>,
    pub new_houses: Option<bool>,
    pub noise_level: Option<Level>,
}

/// Average ratings (0-5) of nearby services.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceRatings {
    pub school_avg_rating: Option<f64>,
    pub restaurant_avg_rating: Option<f64>,
    pub cafe_avg_rating: Option<f64>,
}

/// Driving times in minutes.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TravelTimes {
    pub nearest_city_minutes: Option<f64>,
    pub nearest_beach_minutes: Option<f64>,
}

/// Rental metrics in percent, supplied by market analysis.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InvestmentMetrics {
    pub rental_yield: Option<f64>,
    pub cap_rate: Option<f64>,
}

/// Published scores of one property. Overwritten by every scoring pass.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PropertyScores {
    pub score_investment: f64,
    pub score_lifestyle: f64,
    pub score_total: f64,
    pub scored_at: DateTime<Utc>,
    /// Absent when scoring the property failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<ScoreBreakdown>,
}

impl PropertyScores {
    /// Record written when scoring a property failed.
    pub fn failed() -> Self {
        Self {
            score_investment: 0.0,
            score_lifestyle: 0.0,
            score_total: 0.0,
            scored_at: Utc::now(),
            breakdown: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_enriched_bundle() {
        let json = r#"{
            "id": 7,
            "title": "Parcela con vistas",
            "price": 150000,
            "area": 1500,
            "land_type": "buildable",
            "infrastructure_basic": { "electricity": true, "water": false },
            "environment": { "sea_view": true, "orientation": "South" },
            "neighborhood": { "area_price_level": "high" }
        }"#;
        let property: Property = serde_json::from_str(json).unwrap();
        assert_eq!(property.id, 7);
        assert_eq!(property.attributes.land_type, Some(LandType::Buildable));
        let basic = property.attributes.infrastructure_basic.unwrap();
        assert_eq!(basic.electricity, Some(true));
        assert_eq!(basic.gas, None);
        assert!(property.attributes.transport.is_none());
        assert!(property.scores.is_none());
    }

    #[test]
    fn test_display_title_falls_back_to_id() {
        let mut property = Property::new(3, PropertyAttributes::default());
        assert_eq!(property.display_title(), "Property #3");
        property.title = Some("  Finca  ".to_string());
        assert_eq!(property.display_title(), "Finca");
    }

    #[test]
    fn test_unscored_property_omits_scores() {
        let property = Property::new(1, PropertyAttributes::default());
        let json = serde_json::to_string(&property).unwrap();
        assert!(!json.contains("scores"));
    }
}
