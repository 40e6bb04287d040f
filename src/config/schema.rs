use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::scoring::ScoringConfig;

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory holding weights.json and properties.json
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Properties scored per committed batch
    #[serde(default)]
    pub batch_size: Option<usize>,

    #[serde(default)]
    pub scoring: Option<ScoringConfig>,
}
