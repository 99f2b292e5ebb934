//! Validation Metrics
//!
//! Offline FAR/FRR/EER measurement over a labeled validation set. Not part
//! of the authentication path: this is the tool that replaces guessed
//! accuracy numbers with measured ones when tuning a deployment threshold.

use serde::{Deserialize, Serialize};

use crate::logic::features::{cosine_similarity, FeatureVector};

/// One labeled comparison: a pair of vectors and whether they came from the
/// same user.
pub struct LabeledPair {
    pub a: FeatureVector,
    pub b: FeatureVector,
    pub same_user: bool,
}

/// Measured error rates at one threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRates {
    pub threshold: f32,
    /// Impostor pairs accepted / impostor pairs total
    pub far: f32,
    /// Genuine pairs rejected / genuine pairs total
    pub frr: f32,
    pub genuine_pairs: usize,
    pub impostor_pairs: usize,
}

/// Measure FAR and FRR at a fixed threshold.
pub fn evaluate(pairs: &[LabeledPair], threshold: f32) -> ErrorRates {
    let mut genuine = 0usize;
    let mut impostor = 0usize;
    let mut false_accepts = 0usize;
    let mut false_rejects = 0usize;

    for pair in pairs {
        let accepted = cosine_similarity(&pair.a, &pair.b) >= threshold;
        if pair.same_user {
            genuine += 1;
            if !accepted {
                false_rejects += 1;
            }
        } else {
            impostor += 1;
            if accepted {
                false_accepts += 1;
            }
        }
    }

    ErrorRates {
        threshold,
        far: ratio(false_accepts, impostor),
        frr: ratio(false_rejects, genuine),
        genuine_pairs: genuine,
        impostor_pairs: impostor,
    }
}

/// Sweep thresholds and return the point where FAR and FRR are closest
/// (the equal error rate), along with the full curve.
pub fn eer_sweep(pairs: &[LabeledPair], steps: usize) -> (ErrorRates, Vec<ErrorRates>) {
    assert!(steps >= 2, "sweep needs at least two steps");
    let mut curve = Vec::with_capacity(steps);
    for i in 0..steps {
        // Thresholds across (0, 1]
        let threshold = (i + 1) as f32 / steps as f32;
        curve.push(evaluate(pairs, threshold));
    }

    let best = curve
        .iter()
        .min_by(|a, b| {
            let da = (a.far - a.frr).abs();
            let db = (b.far - b.frr).abs();
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        })
        .cloned()
        .expect("curve is non-empty");

    (best, curve)
}

fn ratio(num: usize, denom: usize) -> f32 {
    if denom == 0 {
        0.0
    } else {
        num as f32 / denom as f32
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::features::FEATURE_DIM;

    fn engineered(similarity: f32) -> (FeatureVector, FeatureVector) {
        let mut a = vec![0.0f32; FEATURE_DIM];
        a[0] = 1.0;
        let mut b = vec![0.0f32; FEATURE_DIM];
        b[0] = similarity;
        b[1] = (1.0 - similarity * similarity).sqrt();
        (
            FeatureVector::from_values(a),
            FeatureVector::from_values(b),
        )
    }

    fn pair(similarity: f32, same_user: bool) -> LabeledPair {
        let (a, b) = engineered(similarity);
        LabeledPair { a, b, same_user }
    }

    #[test]
    fn test_perfect_separation() {
        let pairs = vec![
            pair(0.97, true),
            pair(0.95, true),
            pair(0.3, false),
            pair(0.4, false),
        ];
        let rates = evaluate(&pairs, 0.85);
        assert_eq!(rates.far, 0.0);
        assert_eq!(rates.frr, 0.0);
        assert_eq!(rates.genuine_pairs, 2);
        assert_eq!(rates.impostor_pairs, 2);
    }

    #[test]
    fn test_far_counts_accepted_impostors() {
        let pairs = vec![pair(0.9, false), pair(0.3, false)];
        let rates = evaluate(&pairs, 0.85);
        assert!((rates.far - 0.5).abs() < 1e-6);
        assert_eq!(rates.frr, 0.0);
    }

    #[test]
    fn test_frr_counts_rejected_genuines() {
        let pairs = vec![pair(0.7, true), pair(0.95, true)];
        let rates = evaluate(&pairs, 0.85);
        assert!((rates.frr - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_eer_sweep_bounds() {
        let pairs = vec![
            pair(0.97, true),
            pair(0.9, true),
            pair(0.6, true),
            pair(0.5, false),
            pair(0.2, false),
            pair(0.8, false),
        ];
        let (best, curve) = eer_sweep(&pairs, 20);
        assert_eq!(curve.len(), 20);
        for rates in &curve {
            assert!((0.0..=1.0).contains(&rates.far));
            assert!((0.0..=1.0).contains(&rates.frr));
        }
        assert!((best.far - best.frr).abs() <= 1.0);
    }

    #[test]
    fn test_empty_set_yields_zero_rates() {
        let rates = evaluate(&[], 0.85);
        assert_eq!(rates.far, 0.0);
        assert_eq!(rates.frr, 0.0);
    }
}
