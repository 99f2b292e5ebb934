//! One-Way Vector Sketch
//!
//! 256-bit random-hyperplane signature of a feature vector. The index
//! stores only these sketches, never raw vectors: a sketch cannot be
//! inverted, and Hamming distance between sketches estimates the cosine
//! angle between the originals. This is the privacy-maximizing side of the
//! privacy/recall trade-off, chosen deliberately.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::logic::features::{FeatureVector, FEATURE_DIM};

/// Sketch width in bits.
pub const SKETCH_BITS: usize = 256;

const HYPERPLANE_DOMAIN: &[u8] = b"behavioral-auth/sketch-hyperplanes/v1";

// ============================================================================
// HYPERPLANES
// ============================================================================

/// SKETCH_BITS x FEATURE_DIM sign matrix, expanded once from the fixed
/// domain seed. Row i is the normal of hyperplane i.
static HYPERPLANES: Lazy<Vec<i8>> = Lazy::new(|| {
    let total_bits = SKETCH_BITS * FEATURE_DIM;
    let blocks = total_bits.div_ceil(256);

    let mut seed_hasher = Sha256::new();
    seed_hasher.update(HYPERPLANE_DOMAIN);
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
});

// ============================================================================
// SKETCH
// ============================================================================

/// 256-bit one-way signature of a vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sketch(#[serde(with = "hex_sketch")] pub [u8; 32]);

impl Sketch {
    /// Sign of the projection onto each hyperplane.
    pub fn of(vector: &FeatureVector) -> Self {
        let planes = &*HYPERPLANES;
        let values = vector.as_slice();
        let mut bytes = [0u8; 32];

        for bit in 0..SKETCH_BITS {
            let row = &planes[bit * FEATURE_DIM..(bit + 1) * FEATURE_DIM];
            let mut dot = 0.0f32;
            for (sign, v) in row.iter().zip(values.iter()) {
                dot += *sign as f32 * v;
            }
            if dot >= 0.0 {
                bytes[bit / 8] |= 1 << (bit % 8);
            }
        }
        Self(bytes)
    }

    /// Hamming distance to another sketch.
    pub fn hamming(&self, other: &Sketch) -> u32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }

    /// Cosine estimate from the Hamming distance: cos(pi * h / bits).
    pub fn estimated_cosine(&self, other: &Sketch) -> f32 {
        let h = self.hamming(other) as f32;
        (std::f32::consts::PI * h / SKETCH_BITS as f32).cos()
    }

    /// 16-bit band key for LSH table `band`.
    pub fn band_key(&self, band: usize) -> u16 {
        u16::from_le_bytes([self.0[band * 2], self.0[band * 2 + 1]])
    }
}

mod hex_sketch {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(de)?;
        let raw = hex::decode(&s).map_err(serde::de::Error::custom)?;
        raw.try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn basis(idx: usize) -> FeatureVector {
        let mut values = vec![0.0f32; FEATURE_DIM];
        values[idx] = 1.0;
        FeatureVector::from_values(values)
    }

    #[test]
    fn test_sketch_is_deterministic() {
        let v = basis(5);
        assert_eq!(Sketch::of(&v), Sketch::of(&v));
    }

    #[test]
    fn test_identical_vectors_zero_hamming() {
        let s = Sketch::of(&basis(0));
        assert_eq!(s.hamming(&s), 0);
        assert!((s.estimated_cosine(&s) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_orthogonal_vectors_near_half_hamming() {
        let a = Sketch::of(&basis(0));
        let b = Sketch::of(&basis(1));
        let h = a.hamming(&b);
        // Random hyperplanes split orthogonal vectors on ~half the bits
        assert!(h > 80 && h < 176, "unexpected hamming {}", h);
        assert!(b.estimated_cosine(&a).abs() < 0.45);
    }

    #[test]
    fn test_near_duplicate_small_hamming() {
        let a = basis(0);
        let mut values = a.as_slice().to_vec();
        values[1] = 0.05;
        let b = FeatureVector::from_values(values);
        let h = Sketch::of(&a).hamming(&Sketch::of(&b));
        assert!(h < 30, "near-duplicate hamming {}", h);
    }

    #[test]
    fn test_band_keys_cover_sketch() {
        let s = Sketch::of(&basis(3));
        // 16 bands of 16 bits each
        let mut rebuilt = [0u8; 32];
        for band in 0..16 {
            let key = s.band_key(band).to_le_bytes();
            rebuilt[band * 2] = key[0];
            rebuilt[band * 2 + 1] = key[1];
        }
        assert_eq!(rebuilt, s.0);
    }

    #[test]
    fn test_sketch_serde_round_trip() {
        let s = Sketch::of(&basis(2));
        let json = serde_json::to_string(&s).unwrap();
        let back: Sketch = serde_json::from_str(&json).unwrap();
        assert_eq!(s, back);
    }
}
