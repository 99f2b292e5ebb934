//! Logic Module - Engine Components
//!
//! Leaf-first:
//! - `telemetry` - Raw interaction capture (events, ring buffer, windows)
//! - `features` - Deterministic window-to-embedding extraction
//! - `template` - Encrypted per-identity template store
//! - `index` - Sketch-based approximate similarity index
//! - `zkp` - Commitments and threshold-similarity proofs
//! - `session` - Enrollment/authentication state machine
//! - `token` - Device-bound token issuing
//! - `audit` - Append-only audit trail
//! - `policy` - Deployment tuning with export/import
//! - `metrics` - Offline FAR/FRR/EER evaluation

pub mod audit;
pub mod features;
pub mod index;
pub mod metrics;
pub mod policy;
pub mod session;
pub mod telemetry;
pub mod template;
pub mod token;
pub mod zkp;
