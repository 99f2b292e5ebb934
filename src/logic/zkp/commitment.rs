//! Pedersen Vector Commitment
//!
//! Binding, hiding commitment to a quantized feature vector:
//! C = sum(q_i * G_i) + r * H, plus a key image K = r * H_img that later
//! lets the prover demonstrate possession of the enrollment blinding
//! without opening anything. Commit cost is O(D).

use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::MultiscalarMul;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{AuthError, AuthResult, ProofFailure};
use crate::logic::features::FeatureVector;

use super::generators::generators;

// ============================================================================
// QUANTIZATION
// ============================================================================

/// Fixed-point scale for vector values and similarity margins. Values are
/// in [-1, 1] after L2 normalization, so quantized magnitudes stay well
/// under 2^13.
pub const QUANT_SCALE: f32 = 4096.0;

/// Quantize one value to the fixed-point grid.
pub fn quantize(value: f32) -> i64 {
    (value * QUANT_SCALE).round() as i64
}

/// Signed integer to scalar.
pub fn scalar_from_i64(value: i64) -> Scalar {
    if value >= 0 {
        Scalar::from(value as u64)
    } else {
        -Scalar::from(value.unsigned_abs())
    }
}

// ============================================================================
// COMMITMENT
// ============================================================================

/// Serialized commitment record: the vector commitment point and the
/// blinding key image. Hex-encoded in JSON like every other opaque byte
/// value the store persists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    #[serde(with = "hex_point")]
    pub point: [u8; 32],
    #[serde(with = "hex_point")]
    pub key_image: [u8; 32],
}

impl Commitment {
    pub fn decompress_point(&self) -> Option<RistrettoPoint> {
        CompressedRistretto::from_slice(&self.point).ok()?.decompress()
    }

    pub fn decompress_key_image(&self) -> Option<RistrettoPoint> {
        CompressedRistretto::from_slice(&self.key_image).ok()?.decompress()
    }

    /// Flat byte view, for transcript binding and leakage tests.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64);
        out.extend_from_slice(&self.point);
        out.extend_from_slice(&self.key_image);
        out
    }
}

/// The enrollment blinding. Required to generate proofs; never leaves the
/// encrypted template record. Wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct BlindingSecret {
    r: Scalar,
}

impl BlindingSecret {
    pub(crate) fn scalar(&self) -> &Scalar {
        &self.r
    }

    /// For the encrypted template record only.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.r.to_bytes()
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Option<Self> {
        let r: Option<Scalar> = Scalar::from_canonical_bytes(bytes).into();
        r.map(|r| Self { r })
    }
}

impl std::fmt::Debug for BlindingSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the scalar
        write!(f, "BlindingSecret(..)")
    }
}

// ============================================================================
// COMMIT
// ============================================================================

/// Commit to a feature vector with a fresh random blinding.
pub fn commit(vector: &FeatureVector) -> AuthResult<(Commitment, BlindingSecret)> {
    let r = Scalar::random(&mut OsRng);
    let secret = BlindingSecret { r };
    let commitment = commit_with_blinding(vector, &secret)?;
    Ok((commitment, secret))
}

/// Deterministically recompute the commitment for a known blinding. Used by
/// the prover to bind its transcript to the enrolled commitment without
/// taking the stored record as an extra argument.
pub fn commit_with_blinding(
    vector: &FeatureVector,
    secret: &BlindingSecret,
) -> AuthResult<Commitment> {
    vector.validate()?;
    if !vector.is_finite() {
        return Err(AuthError::ProofConstructionError(ProofFailure::MalformedInput));
    }

    let gens = generators();
    let scalars: Vec<Scalar> = vector
        .as_slice()
        .iter()
        .map(|v| scalar_from_i64(quantize(*v)))
        .chain(std::iter::once(secret.r))
        .collect();
    let points = gens.g.iter().chain(std::iter::once(&gens.h));

    let point = RistrettoPoint::multiscalar_mul(scalars.iter(), points);
    let key_image = secret.r * gens.h_img;

    Ok(Commitment {
        point: point.compress().to_bytes(),
        key_image: key_image.compress().to_bytes(),
    })
}

// ============================================================================
// HEX SERDE
// ============================================================================

mod hex_point {
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
