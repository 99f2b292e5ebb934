//! Zero-Knowledge Similarity Layer
//!
//! - `generators` - Hash-derived Ristretto generator set
//! - `commitment` - Pedersen vector commitment + blinding secret
//! - `range` - Bit-decomposition margin range proof
//! - `proof` - prove/verify of the threshold-similarity statement

pub mod commitment;
pub mod generators;
pub mod proof;
pub mod range;

pub use commitment::{commit, BlindingSecret, Commitment};
pub use proof::{prove, verify, SimilarityProof};
