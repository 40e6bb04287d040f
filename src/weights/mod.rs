pub mod storage;
pub mod store;
pub mod types;

pub use storage::{load_weight_state, save_weight_state, WEIGHTS_FILE};
pub use store::{WeightError, WeightStore};
pub use types::{WeightRecord, WeightState};
