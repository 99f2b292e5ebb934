//! Margin Range Proof
//!
//! Proves that a committed similarity margin lies in [0, 2^16) without
//! revealing it: one Pedersen commitment per bit, a CDS OR-proof that each
//! bit commitment opens to 0 or 1, and a homomorphic weighted sum that
//! reconstructs the margin commitment on the verifier side. Proof size and
//! verification cost are O(B), B = 16.

use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use merlin::Transcript;
use rand::rngs::OsRng;

use super::generators::generators;

/// Margin width in bits. The quantized margin of two unit vectors is at
/// most 2 * QUANT_SCALE = 8192, comfortably inside 16 bits.
pub const MARGIN_BITS: usize = 16;

// Transcript labels
const LABEL_BIT_COMMITMENT: &[u8] = b"margin-bit-commitment";
const LABEL_BIT_NONCE: &[u8] = b"margin-bit-nonce";
const LABEL_CHALLENGE: &[u8] = b"margin-range-challenge";

// ============================================================================
// PROOF STRUCTURE
// ============================================================================

/// Per-bit OR-proof: C opens to 0*G_m or 1*G_m under blinding base H.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitProof {
    pub commitment: [u8; 32],
    pub a0: [u8; 32],
    pub a1: [u8; 32],
    pub c0: [u8; 32],
    pub z0: [u8; 32],
    pub z1: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeProof {
    pub bits: Vec<BitProof>,
}

impl RangeProof {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.bits.len() * 192);
        for bit in &self.bits {
            out.extend_from_slice(&bit.commitment);
            out.extend_from_slice(&bit.a0);
            out.extend_from_slice(&bit.a1);
            out.extend_from_slice(&bit.c0);
            out.extend_from_slice(&bit.z0);
            out.extend_from_slice(&bit.z1);
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != MARGIN_BITS * 192 {
            return None;
        }
        let mut bits = Vec::with_capacity(MARGIN_BITS);
        for chunk in bytes.chunks_exact(192) {
            let field = |i: usize| -> [u8; 32] {
                chunk[i * 32..(i + 1) * 32].try_into().expect("chunk width")
            };
            bits.push(BitProof {
                commitment: field(0),
                a0: field(1),
                a1: field(2),
                c0: field(3),
                z0: field(4),
                z1: field(5),
            });
        }
        Some(Self { bits })
    }
}

// ============================================================================
// PROVE
// ============================================================================

/// Prove `value` is in [0, 2^MARGIN_BITS). The transcript must already be
/// bound to the statement (commitment, threshold, nonce) by the caller.
pub fn prove_range(value: u64, transcript: &mut Transcript) -> RangeProof {
    debug_assert!(value < (1u64 << MARGIN_BITS), "margin out of range");
    let gens = generators();

    // Bit commitments first; every A must be appended before the challenge
    let mut bit_values = [0u8; MARGIN_BITS];
    let mut blindings = Vec::with_capacity(MARGIN_BITS);
    let mut commitments = Vec::with_capacity(MARGIN_BITS);
    for (j, bit_value) in bit_values.iter_mut().enumerate() {
        *bit_value = ((value >> j) & 1) as u8;
        let s = Scalar::random(&mut OsRng);
        let mut point = s * gens.h;
        if *bit_value == 1 {
            point += gens.g_margin;
        }
        let compressed = point.compress();
        transcript.append_message(LABEL_BIT_COMMITMENT, compressed.as_bytes());
        blindings.push(s);
        commitments.push((point, compressed));
    }

    // Sigma nonces: real branch committed, other branch simulated
    struct Pending {
        a0: CompressedRistretto,
        a1: CompressedRistretto,
        w: Scalar,
        c_sim: Scalar,
        z_sim: Scalar,
    }

    let mut pending = Vec::with_capacity(MARGIN_BITS);
    for (j, (point, _)) in commitments.iter().enumerate() {
        let w = Scalar::random(&mut OsRng);
        let c_sim = Scalar::random(&mut OsRng);
        let z_sim = Scalar::random(&mut OsRng);

        let (a0, a1) = if bit_values[j] == 0 {
            // Branch 0 real: A0 = w*H. Branch 1 simulated against C - G_m.
            let a0 = w * gens.h;
            let a1 = z_sim * gens.h - c_sim * (point - gens.g_margin);
            (a0, a1)
        } else {
            // Branch 1 real: A1 = w*H. Branch 0 simulated against C.
            let a0 = z_sim * gens.h - c_sim * point;
            let a1 = w * gens.h;
            (a0, a1)
        };
        let a0 = a0.compress();
        let a1 = a1.compress();
        transcript.append_message(LABEL_BIT_NONCE, a0.as_bytes());
        transcript.append_message(LABEL_BIT_NONCE, a1.as_bytes());
        pending.push(Pending {
            a0,
            a1,
            w,
            c_sim,
            z_sim,
        });
    }

    let c = challenge_scalar(transcript);

    let mut bits = Vec::with_capacity(MARGIN_BITS);
    for (j, p) in pending.into_iter().enumerate() {
        let s = blindings[j];
        let (c0, z0, z1) = if bit_values[j] == 0 {
            let c1 = p.c_sim;
            let c0 = c - c1;
            let z0 = p.w + c0 * s;
            (c0, z0, p.z_sim)
        } else {
            let c0 = p.c_sim;
            let c1 = c - c0;
            let z1 = p.w + c1 * s;
            (c0, p.z_sim, z1)
        };
        bits.push(BitProof {
            commitment: commitments[j].1.to_bytes(),
            a0: p.a0.to_bytes(),
            a1: p.a1.to_bytes(),
            c0: c0.to_bytes(),
            z0: z0.to_bytes(),
            z1: z1.to_bytes(),
        });
    }

    RangeProof { bits }
}

// ============================================================================
// VERIFY
// ============================================================================

/// Verify the range proof against a transcript in the same state the prover
/// saw. Returns the reconstructed margin commitment sum(2^j * C_j) when
/// every check passes.
pub fn verify_range(proof: &RangeProof, transcript: &mut Transcript) -> Option<RistrettoPoint> {
    if proof.bits.len() != MARGIN_BITS {
        return None;
    }
    let gens = generators();

    let mut points = Vec::with_capacity(MARGIN_BITS);
    for bit in &proof.bits {
        transcript.append_message(LABEL_BIT_COMMITMENT, &bit.commitment);
        points.push(decompress(&bit.commitment)?);
    }
    for bit in &proof.bits {
        transcript.append_message(LABEL_BIT_NONCE, &bit.a0);
        transcript.append_message(LABEL_BIT_NONCE, &bit.a1);
    }

    let c = challenge_scalar(transcript);

    let mut margin = RistrettoPoint::identity();
    for (j, bit) in proof.bits.iter().enumerate() {
        let point = points[j];
        let a0 = decompress(&bit.a0)?;
        let a1 = decompress(&bit.a1)?;
        let c0 = scalar(&bit.c0)?;
        let z0 = scalar(&bit.z0)?;
        let z1 = scalar(&bit.z1)?;
        let c1 = c - c0;

        // Branch 0: C opens to 0
        if z0 * gens.h != a0 + c0 * point {
            return None;
        }
        // Branch 1: C opens to 1
        if z1 * gens.h != a1 + c1 * (point - gens.g_margin) {
            return None;
        }

        margin += Scalar::from(1u64 << j) * point;
    }

    Some(margin)
}

// ============================================================================
// INTERNAL HELPERS
// ============================================================================

fn challenge_scalar(transcript: &mut Transcript) -> Scalar {
    let mut wide = [0u8; 64];
    transcript.challenge_bytes(LABEL_CHALLENGE, &mut wide);
    Scalar::from_bytes_mod_order_wide(&wide)
}

fn decompress(bytes: &[u8; 32]) -> Option<RistrettoPoint> {
    CompressedRistretto::from_slice(bytes).ok()?.decompress()
}

fn scalar(bytes: &[u8; 32]) -> Option<Scalar> {
    Scalar::from_canonical_bytes(*bytes).into()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn statement_transcript() -> Transcript {
        let mut t = Transcript::new(b"range-test");
        t.append_message(b"statement", b"fixed statement bytes");
        t
    }

    #[test]
    fn test_range_round_trip() {
        for value in [0u64, 1, 255, 4096, 65535] {
            let proof = prove_range(value, &mut statement_transcript());
            let verified = verify_range(&proof, &mut statement_transcript());
            assert!(verified.is_some(), "value {} should verify", value);
        }
    }

    #[test]
    fn test_range_rejects_transcript_mismatch() {
        let proof = prove_range(77, &mut statement_transcript());
        let mut other = Transcript::new(b"range-test");
        other.append_message(b"statement", b"different statement bytes");
        assert!(verify_range(&proof, &mut other).is_none());
    }

    #[test]
    fn test_range_rejects_tampered_bit() {
        let mut proof = prove_range(1234, &mut statement_transcript());
        proof.bits[3].z0[0] ^= 1;
        assert!(verify_range(&proof, &mut statement_transcript()).is_none());
    }

    #[test]
    fn test_range_rejects_swapped_commitments() {
        let mut proof = prove_range(9, &mut statement_transcript());
        let tmp = proof.bits[0].commitment;
        proof.bits[0].commitment = proof.bits[1].commitment;
        proof.bits[1].commitment = tmp;
        assert!(verify_range(&proof, &mut statement_transcript()).is_none());
    }

    #[test]
    fn test_serialization_round_trip() {
        let proof = prove_range(40_000, &mut statement_transcript());
        let bytes = proof.to_bytes();
        assert_eq!(bytes.len(), MARGIN_BITS * 192);
        let back = RangeProof::from_bytes(&bytes).unwrap();
        assert_eq!(proof, back);
        assert!(verify_range(&back, &mut statement_transcript()).is_some());
    }

    #[test]
    fn test_from_bytes_rejects_wrong_length() {
        assert!(RangeProof::from_bytes(&[0u8; 191]).is_none());
    }
}
