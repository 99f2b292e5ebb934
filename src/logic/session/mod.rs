//! Session Layer - Enrollment and authentication orchestration
//!
//! - `nonce` - Process-wide replay cache
//! - `state` - Explicit state machine, in-flight guard, session pipelines

pub mod nonce;
pub mod state;

pub use nonce::{NonceCache, NONCE_LEN};
pub use state::{
    run_authentication, run_enrollment, verify_proof_once, EnrollmentOutcome, InFlightGuard,
    SessionContext, SessionDeps, SessionState,
};
