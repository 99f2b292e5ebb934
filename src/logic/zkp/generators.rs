//! Generator Derivation
//!
//! Domain-separated Ristretto generators for the commitment scheme. Every
//! generator is hash-derived (nothing-up-my-sleeve) and cached once per
//! process. Changing any domain string is a breaking change to every stored
//! commitment.

use curve25519_dalek::ristretto::RistrettoPoint;
use once_cell::sync::Lazy;
use sha2::{Digest, Sha512};

use crate::logic::features::FEATURE_DIM;

// Domain separators
const DOMAIN_DIMENSION: &[u8] = b"behavioral-auth/gen/dimension";
const DOMAIN_BLINDING: &[u8] = b"behavioral-auth/gen/blinding";
const DOMAIN_KEY_IMAGE: &[u8] = b"behavioral-auth/gen/key-image";
const DOMAIN_MARGIN: &[u8] = b"behavioral-auth/gen/margin";

/// The full generator set used by commitments and proofs.
pub struct Generators {
    /// Per-dimension bases G_i for the vector commitment
    pub g: Vec<RistrettoPoint>,
    /// Blinding base H
    pub h: RistrettoPoint,
    /// Key-image base H_img (proof-of-possession of the blinding)
    pub h_img: RistrettoPoint,
    /// Margin value base G_m (similarity-margin commitment)
    pub g_margin: RistrettoPoint,
}

static GENERATORS: Lazy<Generators> = Lazy::new(|| Generators {
    g: (0..FEATURE_DIM as u64)
        .map(|i| derive_point(DOMAIN_DIMENSION, i))
        .collect(),
    h: derive_point(DOMAIN_BLINDING, 0),
    h_img: derive_point(DOMAIN_KEY_IMAGE, 0),
    g_margin: derive_point(DOMAIN_MARGIN, 0),
});

/// Get the process-wide generator set.
pub fn generators() -> &'static Generators {
    &GENERATORS
}

fn derive_point(domain: &[u8], index: u64) -> RistrettoPoint {
    let mut hasher = Sha512::new();
    hasher.update(domain);
    hasher.update(index.to_le_bytes());
    let digest = hasher.finalize();
    let mut wide = [0u8; 64];
    wide.copy_from_slice(&digest);
    RistrettoPoint::from_uniform_bytes(&wide)
}

// ============================================================================
// TESTS
// ============================================================================
