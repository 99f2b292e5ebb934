//! Error handling
//!
//! Crate-wide error taxonomy. Enrollment surfaces the typed variant to the
//! caller; authentication collapses every internal failure to
//! `AuthenticationRejected` (the real reason goes to the audit trail only).

use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    // Extraction errors
    #[error("insufficient signal: {0}")]
    InsufficientSignal(String),

    #[error("extractor version mismatch: expected v{expected} (hash {expected_hash:08x}), got v{actual} (hash {actual_hash:08x})")]
    VersionMismatch {
        expected: u8,
        expected_hash: u32,
        actual: u8,
        actual_hash: u32,
    },

    #[error("feature extraction failed: {0}")]
    ExtractionError(String),

    // Proof errors
    #[error("proof construction failed: {0}")]
    ProofConstructionError(ProofFailure),

    #[error("proof verification failed")]
    VerificationFailed,

    #[error("nonce replay detected")]
    ReplayDetected,

    // Store errors
    #[error("no template enrolled for identity")]
    TemplateNotFound,

    #[error("identity already enrolled")]
    AlreadyEnrolled,

    #[error("storage error: {0}")]
    StorageError(String),

    // Session errors
    #[error("operation timed out")]
    Timeout,

    #[error("operation cancelled")]
    Cancelled,

    #[error("authentication attempt already in flight for identity")]
    AttemptInFlight,

    /// The single user-visible authentication failure. Never carries the
    /// underlying reason (audit log has it).
    #[error("authentication rejected")]
    AuthenticationRejected,

    // Policy errors
    #[error("invalid policy: {0}")]
    PolicyError(String),
}

/// Why proof construction failed. `StatementFalse` is the soundness gate:
/// the engine refuses to build a proof when the similarity is actually
/// below threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofFailure {
    /// True similarity is below the threshold
    StatementFalse,
    /// Wrong dimensionality or non-finite input
    MalformedInput,
}

impl std::fmt::Display for ProofFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProofFailure::StatementFalse => write!(f, "statement is false"),
            ProofFailure::MalformedInput => write!(f, "malformed input"),
        }
    }
}

impl From<std::io::Error> for AuthError {
    fn from(err: std::io::Error) -> Self {
        AuthError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        AuthError::StorageError(err.to_string())
    }
}

impl AuthError {
    /// Short stable code for the audit trail.
    pub fn reason_code(&self) -> &'static str {
        match self {
            AuthError::InsufficientSignal(_) => "insufficient_signal",
            AuthError::VersionMismatch { .. } => "version_mismatch",
            AuthError::ExtractionError(_) => "extraction_error",
            AuthError::ProofConstructionError(ProofFailure::StatementFalse) => "statement_false",
            AuthError::ProofConstructionError(ProofFailure::MalformedInput) => "malformed_input",
            AuthError::VerificationFailed => "verification_failed",
            AuthError::ReplayDetected => "replay_detected",
            AuthError::TemplateNotFound => "template_not_found",
            AuthError::AlreadyEnrolled => "already_enrolled",
            AuthError::StorageError(_) => "storage_error",
            AuthError::Timeout => "timeout",
            AuthError::Cancelled => "cancelled",
            AuthError::AttemptInFlight => "attempt_in_flight",
            AuthError::AuthenticationRejected => "rejected",
            AuthError::PolicyError(_) => "policy_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes_are_stable() {
        assert_eq!(AuthError::ReplayDetected.reason_code(), "replay_detected");
        assert_eq!(
            AuthError::ProofConstructionError(ProofFailure::StatementFalse).reason_code(),
            "statement_false"
        );
        assert_eq!(AuthError::AuthenticationRejected.reason_code(), "rejected");
    }

    #[test]
    fn test_rejection_message_carries_no_reason() {
        let msg = AuthError::AuthenticationRejected.to_string();
        assert_eq!(msg, "authentication rejected");
    }
}
