pub mod config;
pub mod criteria;
pub mod engine;
pub mod evaluators;
pub mod normalize;
pub mod validation;

pub use config::*;
pub use criteria::{Criterion, Profile, SubScore, SubScores, WeightVector};
pub use engine::{aggregate, ProfileScore, ScoreBreakdown, ScoringEngine, ScoringError};
pub use evaluators::{default_evaluators, evaluate_all, evaluate_with, evaluator, Evaluator, EvaluatorTable};
pub use normalize::{bulk_normalize, is_normalized, redistribute, WEIGHT_TOLERANCE};
pub use validation::{validate_scoring, validate_weight_update};
