//! Similarity Proof
//!
//! Non-interactive proof of "cosine(current, reference) >= threshold" bound
//! to the enrolled commitment and a fresh nonce. Composition:
//!
//! 1. Soundness gate: the prover computes the true similarity and refuses
//!    to build any proof when the statement is false.
//! 2. Schnorr proof of possession of the enrollment blinding against the
//!    commitment's key image (only the enrolling boundary can prove).
//! 3. A 16-bit range proof that the quantized similarity margin is
//!    non-negative.
//!
//! Everything shares one Merlin transcript seeded with {commitment,
//! threshold, nonce, extractor version}, so a proof replays against exactly
//! one statement. `verify` is deterministic and side-effect-free; nonce
//! freshness is the session layer's job.

use curve25519_dalek::ristretto::CompressedRistretto;
use curve25519_dalek::scalar::Scalar;
use merlin::Transcript;
use rand::rngs::OsRng;

use crate::error::{AuthError, AuthResult, ProofFailure};
use crate::logic::features::{cosine_similarity, FeatureVector, EXTRACTOR_VERSION};

use super::commitment::{commit_with_blinding, quantize, BlindingSecret, Commitment};
use super::generators::generators;
use super::range::{prove_range, verify_range, RangeProof, MARGIN_BITS};

const TRANSCRIPT_DOMAIN: &[u8] = b"behavioral-auth/similarity-proof/v1";
const LABEL_COMMITMENT: &[u8] = b"statement-commitment";
const LABEL_THRESHOLD: &[u8] = b"statement-threshold";
const LABEL_NONCE: &[u8] = b"statement-nonce";
const LABEL_VERSION: &[u8] = b"statement-extractor-version";
const LABEL_POK_NONCE: &[u8] = b"pok-nonce";
const LABEL_POK_CHALLENGE: &[u8] = b"pok-challenge";

// ============================================================================
// PROOF STRUCTURE
// ============================================================================

/// Opaque, single-use similarity proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimilarityProof {
    schnorr_a: [u8; 32],
    schnorr_z: [u8; 32],
    range: RangeProof,
}

impl SimilarityProof {
    /// Wire form: Schnorr pair then range proof. Fixed size.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64 + MARGIN_BITS * 192);
        out.extend_from_slice(&self.schnorr_a);
        out.extend_from_slice(&self.schnorr_z);
        out.extend_from_slice(&self.range.to_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 64 + MARGIN_BITS * 192 {
            return None;
        }
        Some(Self {
            schnorr_a: bytes[0..32].try_into().ok()?,
            schnorr_z: bytes[32..64].try_into().ok()?,
            range: RangeProof::from_bytes(&bytes[64..])?,
        })
    }
}

// ============================================================================
// PROVE
// ============================================================================

/// Build a similarity proof, or refuse.
///
/// Fails with `ProofConstructionError(StatementFalse)` when the true
/// similarity is below the threshold, and `MalformedInput` on bad
/// threshold or non-finite vectors. Version-mismatched vectors surface
/// as `VersionMismatch`.
pub fn prove(
    current: &FeatureVector,
    reference: &FeatureVector,
    blinding: &BlindingSecret,
    threshold: f32,
    nonce: &[u8],
) -> AuthResult<SimilarityProof> {
    current.validate()?;
    reference.validate()?;
    if !current.is_finite() || !reference.is_finite() || current.dim() != reference.dim() {
        return Err(AuthError::ProofConstructionError(ProofFailure::MalformedInput));
    }
    if !(threshold.is_finite() && threshold > 0.0 && threshold <= 1.0) {
        return Err(AuthError::ProofConstructionError(ProofFailure::MalformedInput));
    }

    let similarity = cosine_similarity(current, reference);
    let margin = quantize(similarity) - quantize(threshold);
    if margin < 0 {
        // Soundness gate: no proof exists for a false statement.
        return Err(AuthError::ProofConstructionError(ProofFailure::StatementFalse));
    }

    let commitment = commit_with_blinding(reference, blinding)?;
    let mut transcript = statement_transcript(&commitment, threshold, nonce);

    // Schnorr PoK of the enrollment blinding r against K = r * H_img
    let gens = generators();
    let w = Scalar::random(&mut OsRng);
    let a = (w * gens.h_img).compress();
    transcript.append_message(LABEL_POK_NONCE, a.as_bytes());
    let c = pok_challenge(&mut transcript);
    let z = w + c * blinding.scalar();

    let range = prove_range(margin as u64, &mut transcript);

    Ok(SimilarityProof {
        schnorr_a: a.to_bytes(),
        schnorr_z: z.to_bytes(),
        range,
    })
}

// ============================================================================
// VERIFY
// ============================================================================

/// Check a proof against a commitment, threshold and nonce.
///
/// Deterministic transcript replay; no state is touched. Returns false on
/// any malformed input rather than panicking.
pub fn verify(
    proof: &SimilarityProof,
    commitment: &Commitment,
    threshold: f32,
    nonce: &[u8],
) -> bool {
    if !(threshold.is_finite() && threshold > 0.0 && threshold <= 1.0) {
        return false;
    }
    let gens = generators();
    let key_image = match commitment.decompress_key_image() {
        Some(k) => k,
        None => return false,
    };
    let a_point = match CompressedRistretto::from_slice(&proof.schnorr_a)
        .ok()
        .and_then(|c| c.decompress())
    {
        Some(a) => a,
        None => return false,
    };
    let z: Option<Scalar> = Scalar::from_canonical_bytes(proof.schnorr_z).into();
    let z = match z {
        Some(z) => z,
        None => return false,
    };

    let mut transcript = statement_transcript(commitment, threshold, nonce);
    transcript.append_message(LABEL_POK_NONCE, &proof.schnorr_a);
    let c = pok_challenge(&mut transcript);

    if z * gens.h_img != a_point + c * key_image {
        return false;
    }

    verify_range(&proof.range, &mut transcript).is_some()
}

// ============================================================================
// INTERNAL HELPERS
// ============================================================================

fn statement_transcript(commitment: &Commitment, threshold: f32, nonce: &[u8]) -> Transcript {
    let mut transcript = Transcript::new(TRANSCRIPT_DOMAIN);
    transcript.append_message(LABEL_COMMITMENT, &commitment.to_bytes());
    transcript.append_message(LABEL_THRESHOLD, &quantize(threshold).to_le_bytes());
    transcript.append_message(LABEL_NONCE, nonce);
    transcript.append_message(LABEL_VERSION, &[EXTRACTOR_VERSION]);
    transcript
}

fn pok_challenge(transcript: &mut Transcript) -> Scalar {
    let mut wide = [0u8; 64];
    transcript.challenge_bytes(LABEL_POK_CHALLENGE, &mut wide);
    Scalar::from_bytes_mod_order_wide(&wide)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::features::FEATURE_DIM;
    use crate::logic::zkp::commitment::commit;

    /// Vector with an exact engineered cosine similarity to `basis(0)`.
    fn engineered(similarity: f32) -> FeatureVector {
        let mut values = vec![0.0f32; FEATURE_DIM];
        values[0] = similarity;
        values[1] = (1.0 - similarity * similarity).sqrt();
        FeatureVector::from_values(values)
    }

    fn basis() -> FeatureVector {
        let mut values = vec![0.0f32; FEATURE_DIM];
        values[0] = 1.0;
        FeatureVector::from_values(values)
    }

    #[test]
    fn test_completeness_above_threshold() {
        let reference = basis();
        let current = engineered(0.95);
        let (commitment, blinding) = commit(&reference).unwrap();
        let nonce = [7u8; 32];

        let proof = prove(&current, &reference, &blinding, 0.85, &nonce).unwrap();
        assert!(verify(&proof, &commitment, 0.85, &nonce));
    }

    #[test]
    fn test_completeness_at_exact_threshold() {
        let reference = basis();
        let current = engineered(0.85);
        let (commitment, blinding) = commit(&reference).unwrap();
        let nonce = [1u8; 32];

        // Comparison is >=, so the boundary passes
        let proof = prove(&current, &reference, &blinding, 0.85, &nonce).unwrap();
        assert!(verify(&proof, &commitment, 0.85, &nonce));
    }

    #[test]
    fn test_soundness_gate_below_threshold() {
        let reference = basis();
        let current = engineered(0.5);
        let (_, blinding) = commit(&reference).unwrap();

        let result = prove(&current, &reference, &blinding, 0.85, &[2u8; 32]);
        assert!(matches!(
            result,
            Err(AuthError::ProofConstructionError(ProofFailure::StatementFalse))
        ));
    }

    #[test]
    fn test_verify_rejects_wrong_nonce() {
        let reference = basis();
        let current = engineered(0.95);
        let (commitment, blinding) = commit(&reference).unwrap();

        let proof = prove(&current, &reference, &blinding, 0.85, &[3u8; 32]).unwrap();
        assert!(!verify(&proof, &commitment, 0.85, &[4u8; 32]));
    }

    #[test]
    fn test_verify_rejects_other_commitment() {
        let reference = basis();
        let current = engineered(0.95);
        let (_, blinding) = commit(&reference).unwrap();
        // A different enrollment of the same vector
        let (other_commitment, _) = commit(&reference).unwrap();

        let nonce = [5u8; 32];
        let proof = prove(&current, &reference, &blinding, 0.85, &nonce).unwrap();
        assert!(!verify(&proof, &other_commitment, 0.85, &nonce));
    }

    #[test]
    fn test_verify_rejects_different_threshold() {
        let reference = basis();
        let current = engineered(0.95);
        let (commitment, blinding) = commit(&reference).unwrap();
        let nonce = [6u8; 32];

        let proof = prove(&current, &reference, &blinding, 0.85, &nonce).unwrap();
        assert!(!verify(&proof, &commitment, 0.9, &nonce));
    }

    #[test]
    fn test_verify_rejects_tampered_proof() {
        let reference = basis();
        let current = engineered(0.95);
        let (commitment, blinding) = commit(&reference).unwrap();
        let nonce = [8u8; 32];

        let proof = prove(&current, &reference, &blinding, 0.85, &nonce).unwrap();
        let mut bytes = proof.to_bytes();
        bytes[40] ^= 0x01;
        let tampered = SimilarityProof::from_bytes(&bytes).unwrap();
        assert!(!verify(&tampered, &commitment, 0.85, &nonce));
    }

    #[test]
    fn test_malformed_threshold_refused() {
        let reference = basis();
        let (_, blinding) = commit(&reference).unwrap();
        for bad in [0.0f32, -0.5, 1.5, f32::NAN] {
            let result = prove(&reference, &reference, &blinding, bad, &[0u8; 32]);
            assert!(matches!(
                result,
                Err(AuthError::ProofConstructionError(ProofFailure::MalformedInput))
            ));
        }
    }

    #[test]
    fn test_stale_extractor_version_refused() {
        let reference = basis();
        let mut current = engineered(0.95);
        current.version = EXTRACTOR_VERSION + 1;
        let (_, blinding) = commit(&reference).unwrap();

        let result = prove(&current, &reference, &blinding, 0.85, &[0u8; 32]);
        assert!(matches!(result, Err(AuthError::VersionMismatch { .. })));
    }

    #[test]
    fn test_proof_serialization_round_trip() {
        let reference = basis();
        let current = engineered(0.95);
        let (commitment, blinding) = commit(&reference).unwrap();
        let nonce = [9u8; 32];

        let proof = prove(&current, &reference, &blinding, 0.85, &nonce).unwrap();
        let back = SimilarityProof::from_bytes(&proof.to_bytes()).unwrap();
        assert_eq!(proof, back);
        assert!(verify(&back, &commitment, 0.85, &nonce));
    }

    #[test]
    fn test_no_raw_vector_leakage() {
        let reference = basis();
        let current = engineered(0.95);
        let (commitment, blinding) = commit(&reference).unwrap();

        let proof = prove(&current, &reference, &blinding, 0.85, &[10u8; 32]).unwrap();
        let proof_bytes = proof.to_bytes();
        let commitment_bytes = commitment.to_bytes();

        // Raw f32 little-endian rendering of the vectors
        for vector in [&reference, &current] {
            let raw: Vec<u8> = vector
                .as_slice()
                .iter()
                .flat_map(|v| v.to_le_bytes())
                .collect();
            for chunk in raw.chunks_exact(16) {
                assert!(
                    !contains(&proof_bytes, chunk),
                    "proof leaks raw vector bytes"
                );
                assert!(
                    !contains(&commitment_bytes, chunk),
                    "commitment leaks raw vector bytes"
                );
            }
            // Fixed quantized transform of the vector
            let quantized: Vec<u8> = vector
                .as_slice()
                .iter()
                .flat_map(|v| (quantize(*v) as i16).to_le_bytes())
                .collect();
            for chunk in quantized.chunks_exact(16) {
                assert!(!contains(&proof_bytes, chunk));
                assert!(!contains(&commitment_bytes, chunk));
            }
        }
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }
}
