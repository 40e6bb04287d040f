pub mod storage;
pub mod types;

pub use storage::{load_properties, merge_properties, read_bundles, save_properties, PROPERTIES_FILE};
pub use types::{
    BasicInfrastructure, EnvironmentFeatures, ExtendedInfrastructure, InvestmentMetrics, LandType,
    Level, Neighborhood, Property, PropertyAttributes, PropertyScores, ServiceRatings,
    TransportAccess, TravelTimes,
};
