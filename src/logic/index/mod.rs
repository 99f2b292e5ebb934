//! Similarity Index - Approximate identity lookup
//!
//! - `sketch` - One-way 256-bit random-hyperplane signatures
//! - `lsh` - Banded LSH tables with tunable recall/latency

pub mod lsh;
pub mod sketch;

pub use lsh::{IndexSnapshot, SimilarityIndex};
pub use sketch::Sketch;
