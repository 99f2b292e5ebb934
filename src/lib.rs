//! Behavioral Auth Core
//!
//! On-device behavioral-biometric enrollment and authentication: raw
//! interaction telemetry is distilled into a feature vector, committed
//! under a Pedersen commitment, and later matched by a zero-knowledge
//! similarity proof — the behavioral data itself never leaves the device
//! and is never stored or transmitted in raw form.
//!
//! Pipeline per session: capture -> extract -> commit/prove -> verify ->
//! issue token. See `logic` for the engine components and `AuthEngine` for
//! the public surface.
//!
//! ```no_run
//! use behavioral_auth_core::{AuthEngine, AuthEngineConfig, TelemetryEvent};
//! use std::sync::mpsc;
//!
//! let engine = AuthEngine::new(AuthEngineConfig::new(b"device-keystore-secret")).unwrap();
//!
//! let (tx, rx) = mpsc::channel();
//! tx.send(TelemetryEvent::key_press(0, 85_000.0)).unwrap();
//! # drop(tx);
//! let outcome = engine.enroll("user-1", &rx);
//! ```

pub mod constants;
pub mod engine;
pub mod error;
pub mod logic;

pub use engine::{AuthEngine, AuthEngineConfig};
pub use error::{AuthError, AuthResult, ProofFailure};
pub use logic::features::{FeatureVector, EXTRACTOR_VERSION, FEATURE_DIM};
pub use logic::policy::EnginePolicy;
pub use logic::session::{EnrollmentOutcome, SessionState};
pub use logic::telemetry::{CancelToken, EventKind, EventPayload, TelemetryEvent};
pub use logic::template::{DecayPolicy, TemplateSummary};
pub use logic::token::AuthToken;
pub use logic::zkp::{Commitment, SimilarityProof};
