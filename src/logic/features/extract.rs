//! Feature Extraction
//!
//! Deterministic transform from one closed telemetry window to a normalized
//! 1536-D feature vector: multi-modal gate, per-kind aggregation, fixed
//! standardization, pseudo-random sign projection, L2 normalization.
//!
//! The projection matrix is expanded from SHA-256 keyed by the extractor
//! version, so the whole pipeline is a pure function of (window, version) —
//! no RNG state, no learned weights loaded at runtime.

use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};

use crate::error::{AuthError, AuthResult};
use crate::logic::telemetry::TelemetryBuffer;

use super::layout::{AGGREGATE_COUNT, AGGREGATE_SCALERS, EXTRACTOR_VERSION, FEATURE_DIM};
use super::stats::aggregate;
use super::vector::FeatureVector;

/// Standardized aggregates are clamped to this many scale units so a single
/// wild slot cannot dominate the embedding.
const CLAMP_SIGMA: f32 = 8.0;

/// Domain separator for the projection expansion.
const PROJECTION_DOMAIN: &[u8] = b"behavioral-auth/projection/v1";

// ============================================================================
// PROJECTION MATRIX
// ============================================================================

/// Row-major sign matrix (+1/-1), FEATURE_DIM x AGGREGATE_COUNT, expanded
/// once per process from the versioned seed.
static PROJECTION_SIGNS: Lazy<Vec<i8>> = Lazy::new(|| expand_signs(EXTRACTOR_VERSION));

fn expand_signs(version: u8) -> Vec<i8> {
    let total_bits = FEATURE_DIM * AGGREGATE_COUNT;
    let blocks = total_bits.div_ceil(256);

    let mut seed_hasher = Sha256::new();
    seed_hasher.update(PROJECTION_DOMAIN);
    seed_hasher.update([version]);
    let seed = seed_hasher.finalize();

    let mut signs = Vec::with_capacity(total_bits);
    for block in 0..blocks as u64 {
        let mut hasher = Sha256::new();
        hasher.update(seed);
        hasher.update(block.to_le_bytes());
        let digest = hasher.finalize();
        for byte in digest {
            for bit in 0..8 {
                if signs.len() == total_bits {
                    break;
                }
                signs.push(if (byte >> bit) & 1 == 1 { 1i8 } else { -1i8 });
            }
        }
    }
    signs
}

// ============================================================================
// EXTRACTION
// ============================================================================

/// Extract a normalized feature vector from a closed window.
///
/// Gate: the window must span at least `min_window_ms` and contain at least
/// two distinct event kinds; otherwise `InsufficientSignal`. Given an
/// identical window the output is bit-identical.
pub fn extract(window: &TelemetryBuffer, min_window_ms: u64) -> AuthResult<FeatureVector> {
    let min_span_us = min_window_ms * 1_000;
    if window.span_us() < min_span_us {
        return Err(AuthError::InsufficientSignal(format!(
            "window spans {}us, need {}us",
            window.span_us(),
            min_span_us
        )));
    }
    if window.distinct_kinds() < 2 {
        return Err(AuthError::InsufficientSignal(format!(
            "window has {} event kind(s), need at least 2",
            window.distinct_kinds()
        )));
    }

    let raw = aggregate(window);

    // Fixed standardization + clamp
    let mut standardized = [0.0f32; AGGREGATE_COUNT];
    for (i, (value, (center, scale))) in raw.iter().zip(AGGREGATE_SCALERS.iter()).enumerate() {
        let z = (value - center) / scale;
        standardized[i] = z.clamp(-CLAMP_SIGMA, CLAMP_SIGMA);
    }

    // Sign projection into the embedding space
    let inv_sqrt = 1.0f32 / (AGGREGATE_COUNT as f32).sqrt();
    let signs = &*PROJECTION_SIGNS;
    let mut values = vec![0.0f32; FEATURE_DIM];
    for (k, out) in values.iter_mut().enumerate() {
        let row = &signs[k * AGGREGATE_COUNT..(k + 1) * AGGREGATE_COUNT];
        let mut acc = 0.0f32;
        for (sign, z) in row.iter().zip(standardized.iter()) {
            acc += *sign as f32 * z;
        }
        *out = acc * inv_sqrt;
    }

    let mut vector = FeatureVector::from_values(values);
    if vector.l2_norm() <= f32::EPSILON {
        // Window matched the scaler centers everywhere; nothing to compare.
        return Err(AuthError::InsufficientSignal(
            "degenerate window produced a zero embedding".to_string(),
        ));
    }
    vector.l2_normalize();

    log::debug!(
        "extracted v{} vector from {} events ({} kinds, {}us span)",
        vector.version,
        window.len(),
        window.distinct_kinds(),
        window.span_us()
    );

    Ok(vector)
}

// ============================================================================
// TESTS
// ============================================================================
