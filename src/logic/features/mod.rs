//! Features - Window to embedding
//!
//! - `layout` - Versioned aggregate schema (single source of truth)
//! - `stats` - Per-kind statistical aggregation
//! - `extract` - Gate, standardize, project, normalize
//! - `vector` - Versioned FeatureVector + cosine similarity

pub mod extract;
pub mod layout;
pub mod stats;
pub mod vector;

pub use extract::extract;
pub use layout::{layout_hash, validate_layout, EXTRACTOR_VERSION, FEATURE_DIM};
pub use vector::{cosine_similarity, FeatureVector};
