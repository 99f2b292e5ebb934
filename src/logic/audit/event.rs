//! Audit Event Types
//!
//! Immutable, timestamped engine events for the append-only audit trail.
//! Authentication rejections carry their real reason code HERE and nowhere
//! else: callers only ever see the collapsed rejection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// EVENT TYPES
// ============================================================================

/// Categories of audit events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditKind {
    /// Enrollment completed and a template was written
    EnrollmentSucceeded,
    /// Enrollment aborted, no partial state persisted
    EnrollmentFailed,
    /// Proof verified, token issued
    AuthenticationGranted,
    /// Authentication rejected (reason_code has the internal cause)
    AuthenticationRejected,
    /// A nonce was presented twice
    ReplayDetected,
    /// Template re-committed by the adaptive decay policy
    TemplateUpdated,
    /// Identity revoked and removed
    IdentityRevoked,
    /// Every template and the index wiped
    StoreWiped,
    /// Engine constructed
    EngineStart,
    /// Engine shut down
    EngineStop,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::EnrollmentSucceeded => "enrollment_succeeded",
            AuditKind::EnrollmentFailed => "enrollment_failed",
            AuditKind::AuthenticationGranted => "authentication_granted",
            AuditKind::AuthenticationRejected => "authentication_rejected",
            AuditKind::ReplayDetected => "replay_detected",
            AuditKind::TemplateUpdated => "template_updated",
            AuditKind::IdentityRevoked => "identity_revoked",
            AuditKind::StoreWiped => "store_wiped",
            AuditKind::EngineStart => "engine_start",
            AuditKind::EngineStop => "engine_stop",
        }
    }
}

// ============================================================================
// AUDIT EVENT
// ============================================================================

/// Immutable audit record. Append-only; never modified after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: String,
    /// When the event occurred (UTC)
    pub timestamp: DateTime<Utc>,
    /// Type of event
    pub kind: AuditKind,
    /// Session this event belongs to (if any)
    pub session_id: Option<String>,
    /// Identity involved (if resolved)
    pub identity_id: Option<String>,
    /// Internal reason code (rejections and failures)
    pub reason_code: Option<String>,
    /// Human-readable description
    pub description: String,
    /// Additional metadata
    pub metadata: Option<serde_json::Value>,
}

impl AuditEvent {
    pub fn new(kind: AuditKind, description: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            kind,
            session_id: None,
            identity_id: None,
            reason_code: None,
            description: description.to_string(),
            metadata: None,
        }
    }

    // Builder pattern methods
    pub fn with_session(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }

    pub fn with_identity(mut self, identity_id: &str) -> Self {
        self.identity_id = Some(identity_id.to_string());
        self
    }

    pub fn with_reason(mut self, reason_code: &str) -> Self {
        self.reason_code = Some(reason_code.to_string());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Convert to JSONL line (for the append-only log)
    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_event_creation() {
        let event = AuditEvent::new(AuditKind::EngineStart, "engine up");
        assert!(!event.id.is_empty());
        assert_eq!(event.kind, AuditKind::EngineStart);
        assert!(event.reason_code.is_none());
    }

    #[test]
    fn test_event_builder() {
        let event = AuditEvent::new(AuditKind::AuthenticationRejected, "rejected")
            .with_session("s-1")
            .with_identity("u1")
            .with_reason("statement_false");

        assert_eq!(event.session_id.as_deref(), Some("s-1"));
        assert_eq!(event.identity_id.as_deref(), Some("u1"));
        assert_eq!(event.reason_code.as_deref(), Some("statement_false"));
    }

    #[test]
    fn test_event_to_jsonl() {
        let event = AuditEvent::new(AuditKind::ReplayDetected, "nonce reuse");
        let line = event.to_jsonl();
        assert!(line.contains("ReplayDetected"));
        assert!(!line.contains('\n'));
    }
}
