use super::criteria::{Criterion, WeightVector};
use tracing::warn;

/// Allowed drift of a weight vector's total from 1.0.
pub const WEIGHT_TOLERANCE: f64 = 0.001;

/// True when the weights sum to 1.0 within [`WEIGHT_TOLERANCE`].
pub fn is_normalized(weights: &WeightVector) -> bool {
    (weights.total() - 1.0).abs() <= WEIGHT_TOLERANCE
}

/// Scale every weight by 1/total so the vector sums to 1.0.
///
/// A zero total spreads the budget equally (1/N each). Negative or
/// non-finite weights are treated as zero.
pub fn bulk_normalize(weights: &WeightVector) -> WeightVector {
    if weights.is_empty() {
        return WeightVector::new();
    }

    let sanitized: WeightVector = weights
        .iter()
        .map(|(criterion, weight)| {
            if weight.is_finite() && weight >= 0.0 {
                (criterion, weight)
            } else {
                warn!(%criterion, weight, "ignoring invalid weight during normalization");
                (criterion, 0.0)
            }
        })
        .collect();

    let total = sanitized.total();
    if total <= 0.0 {
        let equal = 1.0 / sanitized.len() as f64;
        return sanitized.criteria().map(|c| (c, equal)).collect();
    }

    sanitized.iter().map(|(c, w)| (c, w / total)).collect()
}

/// Set `changed` to `value` and rescale every other weight so the vector
/// still sums to 1.0 while keeping their relative ratios.
///
/// `value` is clamped to [0, 1]. When the other weights are all zero the
/// remaining budget is split equally among them. A criterion missing from
/// the vector is added.
pub fn redistribute(weights: &WeightVector, changed: Criterion, value: f64) -> WeightVector {
    let value = if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 };
    let others: Vec<(Criterion, f64)> = weights
        .iter()
        .filter(|(c, _)| *c != changed)
        .map(|(c, w)| (c, if w.is_finite() { w.max(0.0) } else { 0.0 }))
        .collect();

    let mut result = WeightVector::new();
    if others.is_empty() {
        // Sole criterion carries the whole budget.
        result.insert(changed, 1.0);
        return result;
    }

    result.insert(changed, value);
    let remaining = 1.0 - value;
    let others_total: f64 = others.iter().map(|(_, w)| w).sum();

    if others_total > 0.0 {
        for (criterion, weight) in others {
            result.insert(criterion, weight / others_total * remaining);
        }
    } else {
        let share = remaining / others.len() as f64;
        for (criterion, _) in others {
            result.insert(criterion, share);
        }
    }

    result
}
