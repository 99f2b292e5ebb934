//! Feature Vector - Core data structure for similarity comparison
//!
//! **Versioned vector with layout validation**
//!
//! Deliberately has no serde derives: a FeatureVector is transient and must
//! never reach durable storage or a wire in raw form. The template store
//! keeps the quantized reference only inside its encrypted record.

use super::layout::{layout_hash, validate_layout, EXTRACTOR_VERSION, FEATURE_DIM};
use crate::error::AuthResult;

// ============================================================================
// VERSIONED FEATURE VECTOR
// ============================================================================

/// Versioned feature vector in the 1536-D embedding space.
///
/// Invariants: `values.len() == FEATURE_DIM`, every value finite,
/// L2-normalized by the extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    /// Extractor layout version this vector was produced under
    pub version: u8,
    /// CRC32 hash of the extractor layout (for mismatch detection)
    pub layout_hash: u32,
    /// Embedding values
    values: Vec<f32>,
}

impl FeatureVector {
    /// Wrap raw values under the current layout version.
    ///
    /// Panics if the dimension is wrong; callers construct vectors only
    /// through the extractor or test helpers that control the length.
    pub fn from_values(values: Vec<f32>) -> Self {
        assert_eq!(values.len(), FEATURE_DIM, "feature vector dimension");
        Self {
            version: EXTRACTOR_VERSION,
            layout_hash: layout_hash(),
            values,
        }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Validate version/layout compatibility with the running extractor.
    pub fn validate(&self) -> AuthResult<()> {
        validate_layout(self.version, self.layout_hash)
    }

    /// All values finite (extraction clamps, so this holds by construction).
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }

    /// Euclidean norm.
    pub fn l2_norm(&self) -> f32 {
        self.values.iter().map(|v| (*v as f64).powi(2)).sum::<f64>().sqrt() as f32
    }

    /// Scale to unit norm in place. No-op on a zero vector.
    pub fn l2_normalize(&mut self) {
        let norm = self.l2_norm();
        if norm > f32::EPSILON {
            for v in &mut self.values {
                *v /= norm;
            }
        }
    }
}

// ============================================================================
// SIMILARITY
// ============================================================================

/// Cosine similarity in [-1, 1].
///
/// Accumulates in f64 so 1536 small terms don't lose precision.
pub fn cosine_similarity(a: &FeatureVector, b: &FeatureVector) -> f32 {
    debug_assert_eq!(a.dim(), b.dim());

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.as_slice().iter().zip(b.as_slice().iter()) {
        dot += *x as f64 * *y as f64;
        norm_a += (*x as f64).powi(2);
        norm_b += (*y as f64).powi(2);
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    (dot / denom).clamp(-1.0, 1.0) as f32
}

// ============================================================================
// TESTS
// ============================================================================
