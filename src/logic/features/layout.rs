//! Extractor Layout - Centralized Aggregate Definition
//!
//! **CRITICAL: This file controls the extractor schema**
//!
//! ## Rules (NEVER break these):
//! 1. Add an aggregate slot → increment EXTRACTOR_VERSION
//! 2. Change slot order or a scaler constant → increment EXTRACTOR_VERSION
//! 3. Remove a slot → increment EXTRACTOR_VERSION
//!
//! Templates carry the version + hash they were extracted under; a vector
//! from a different layout must never be compared against them.

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

// ============================================================================
// EXTRACTOR VERSION
// ============================================================================

/// Current extractor layout version
/// MUST be incremented when the layout or scalers change
pub const EXTRACTOR_VERSION: u8 = 1;

/// Embedding dimension of the final feature vector
pub const FEATURE_DIM: usize = 1536;

// ============================================================================
// AGGREGATE LAYOUT (Authoritative source)
// ============================================================================

/// Aggregate slot names in exact order they feed the projection.
/// This is the SINGLE SOURCE OF TRUTH for the aggregate stage.
pub const AGGREGATE_LAYOUT: &[&str] = &[
    // === Keystroke dynamics (0-4) ===
    "key_rate",             // 0: KeyPress events per second
    "key_iki_mean_ms",      // 1: Inter-key interval mean
    "key_iki_var",          // 2: Inter-key interval variance
    "key_dwell_mean_ms",    // 3: Key dwell time mean
    "key_dwell_var",        // 4: Key dwell time variance

    // === Touch trajectory (5-9) ===
    "move_velocity_mean",   // 5: Swipe velocity mean
    "move_velocity_var",    // 6: Swipe velocity variance
    "move_x_mean",          // 7: Mean normalized X position
    "move_y_mean",          // 8: Mean normalized Y position
    "move_xy_spread",       // 9: Positional spread (std x + std y)

    // === Touch pressure (10-13) ===
    "press_pressure_mean",  // 10: Pressure mean
    "press_pressure_var",   // 11: Pressure variance
    "press_area_mean",      // 12: Contact area mean
    "press_interval_ms",    // 13: Inter-press interval mean

    // === Device motion (14-19) ===
    "motion_mag_mean",      // 14: Acceleration magnitude mean
    "motion_mag_var",       // 15: Acceleration magnitude variance
    "motion_band_0",        // 16: Spectral energy, lowest band
    "motion_band_1",        // 17: Spectral energy, low-mid band
    "motion_band_2",        // 18: Spectral energy, high-mid band
    "motion_band_3",        // 19: Spectral energy, highest band

    // === Cross-modal (20-21) ===
    "mix_kinds_present",    // 20: Distinct event kinds in the window
    "mix_events_per_sec",   // 21: Overall event rate
];

/// Total number of aggregate slots
/// IMPORTANT: Must match AGGREGATE_LAYOUT.len()!
pub const AGGREGATE_COUNT: usize = 22;

/// Fixed per-slot standardization constants (center, scale), one per slot,
/// in layout order. These play the role of a learned scaler: they were
/// chosen from typical interaction ranges and are part of the versioned
/// schema (changing one bumps EXTRACTOR_VERSION).
pub const AGGREGATE_SCALERS: &[(f32, f32)] = &[
    (3.0, 3.0),        // key_rate
    (220.0, 150.0),    // key_iki_mean_ms
    (4000.0, 6000.0),  // key_iki_var
    (95.0, 45.0),      // key_dwell_mean_ms
    (600.0, 900.0),    // key_dwell_var
    (0.8, 0.8),        // move_velocity_mean
    (0.3, 0.4),        // move_velocity_var
    (0.5, 0.3),        // move_x_mean
    (0.5, 0.3),        // move_y_mean
    (0.3, 0.25),       // move_xy_spread
    (0.45, 0.25),      // press_pressure_mean
    (0.02, 0.03),      // press_pressure_var
    (0.15, 0.1),       // press_area_mean
    (400.0, 350.0),    // press_interval_ms
    (1.2, 1.0),        // motion_mag_mean
    (0.5, 0.6),        // motion_mag_var
    (0.25, 0.25),      // motion_band_0
    (0.2, 0.2),        // motion_band_1
    (0.15, 0.18),      // motion_band_2
    (0.1, 0.15),       // motion_band_3
    (2.5, 1.5),        // mix_kinds_present
    (25.0, 25.0),      // mix_events_per_sec
];

// ============================================================================
// LAYOUT HASH
// ============================================================================

/// Compute CRC32 hash of the extractor layout
/// Used to detect layout mismatches at runtime
pub fn compute_layout_hash() -> u32 {
    let mut hasher = Hasher::new();

    hasher.update(&[EXTRACTOR_VERSION]);
    hasher.update(&(FEATURE_DIM as u32).to_le_bytes());

    for (name, (center, scale)) in AGGREGATE_LAYOUT.iter().zip(AGGREGATE_SCALERS.iter()) {
        hasher.update(name.as_bytes());
        hasher.update(&[0]); // Separator
        hasher.update(&center.to_le_bytes());
        hasher.update(&scale.to_le_bytes());
    }

    hasher.finalize()
}

/// Get layout hash (inputs are const, so the value is stable per version)
pub fn layout_hash() -> u32 {
    compute_layout_hash()
}

// ============================================================================
// LAYOUT INFO
// ============================================================================

/// Complete layout information for logging and policy export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub version: u8,
    pub hash: u32,
    pub feature_dim: usize,
    pub aggregate_count: usize,
    pub aggregate_names: Vec<String>,
}

impl LayoutInfo {
    pub fn current() -> Self {
        Self {
            version: EXTRACTOR_VERSION,
            hash: layout_hash(),
            feature_dim: FEATURE_DIM,
            aggregate_count: AGGREGATE_COUNT,
            aggregate_names: AGGREGATE_LAYOUT.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// ============================================================================
// LAYOUT VALIDATION
// ============================================================================

/// Validate that incoming data matches the current layout
pub fn validate_layout(incoming_version: u8, incoming_hash: u32) -> Result<(), crate::error::AuthError> {
    let current_hash = layout_hash();

    if incoming_version != EXTRACTOR_VERSION || incoming_hash != current_hash {
        return Err(crate::error::AuthError::VersionMismatch {
            expected: EXTRACTOR_VERSION,
            expected_hash: current_hash,
            actual: incoming_version,
            actual_hash: incoming_hash,
        });
    }

    Ok(())
}

/// Check if a layout is compatible (same version, same hash)
pub fn is_layout_compatible(version: u8, hash: u32) -> bool {
    version == EXTRACTOR_VERSION && hash == layout_hash()
}

/// Get aggregate slot index by name
pub fn aggregate_index(name: &str) -> Option<usize> {
    AGGREGATE_LAYOUT.iter().position(|&n| n == name)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_count() {
        assert_eq!(AGGREGATE_COUNT, 22);
        assert_eq!(AGGREGATE_LAYOUT.len(), AGGREGATE_COUNT);
        assert_eq!(AGGREGATE_SCALERS.len(), AGGREGATE_COUNT);
    }

    #[test]
    fn test_layout_hash_consistency() {
        assert_eq!(compute_layout_hash(), compute_layout_hash());
        assert_ne!(layout_hash(), 0);
    }

    #[test]
    fn test_validate_layout_success() {
        assert!(validate_layout(EXTRACTOR_VERSION, layout_hash()).is_ok());
    }

    #[test]
    fn test_validate_layout_version_mismatch() {
        let result = validate_layout(EXTRACTOR_VERSION + 1, layout_hash());
        assert!(matches!(
            result,
            Err(crate::error::AuthError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_validate_layout_hash_mismatch() {
        assert!(validate_layout(EXTRACTOR_VERSION, layout_hash() ^ 1).is_err());
    }

    #[test]
    fn test_aggregate_index() {
        assert_eq!(aggregate_index("key_rate"), Some(0));
        assert_eq!(aggregate_index("mix_events_per_sec"), Some(21));
        assert_eq!(aggregate_index("nonexistent"), None);
    }

    #[test]
    fn test_scalers_are_positive() {
        for (i, (_, scale)) in AGGREGATE_SCALERS.iter().enumerate() {
            assert!(*scale > 0.0, "scale for slot {} must be positive", i);
        }
    }

    #[test]
    fn test_layout_info() {
        let info = LayoutInfo::current();
        assert_eq!(info.version, EXTRACTOR_VERSION);
        assert_eq!(info.feature_dim, FEATURE_DIM);
        assert_eq!(info.aggregate_names.len(), AGGREGATE_COUNT);
    }
}
