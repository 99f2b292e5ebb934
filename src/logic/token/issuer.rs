//! Token Issuer
//!
//! Short-lived authentication tokens signed by a device-bound Ed25519 key.
//! A token is `{subject, issued_at, expires_at, scope}` plus a signature
//! over the canonical payload. Expired or invalid tokens are rejected,
//! never repaired or extended.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use parking_lot::RwLock;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

// ============================================================================
// TOKEN
// ============================================================================

/// Signed authentication token. The caller holds a copy; there is no
/// central registry beyond the revocation list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthToken {
    pub subject_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub scope: String,
    /// Hex Ed25519 signature over the canonical payload
    pub signature: String,
}

impl AuthToken {
    /// Canonical byte payload the signature covers. Field order is fixed;
    /// timestamps are microsecond integers so re-serialization cannot
    /// change the bytes.
    fn payload(
        subject_id: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        scope: &str,
    ) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(subject_id.as_bytes());
        out.push(0);
        out.extend_from_slice(&issued_at.timestamp_micros().to_le_bytes());
        out.extend_from_slice(&expires_at.timestamp_micros().to_le_bytes());
        out.extend_from_slice(scope.as_bytes());
        out
    }

    pub fn ttl(&self) -> Duration {
        self.expires_at - self.issued_at
    }
}

// ============================================================================
// ISSUER
// ============================================================================

pub struct TokenIssuer {
    signing_key: SigningKey,
    revoked: RwLock<HashSet<String>>,
}

impl TokenIssuer {
    /// Generate a fresh device-bound signing key.
    pub fn new() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
            revoked: RwLock::new(HashSet::new()),
        }
    }

    /// Public half, for out-of-process validators.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Mint a token for `subject_id` with the given TTL.
    pub fn issue(&self, subject_id: &str, scope: &str, ttl_secs: i64) -> AuthToken {
        let issued_at = Utc::now();
        let expires_at = issued_at + Duration::seconds(ttl_secs);
        let payload = AuthToken::payload(subject_id, issued_at, expires_at, scope);
        let signature: Signature = self.signing_key.sign(&payload);

        log::info!(
            "token issued: subject={} scope={} ttl={}s",
            subject_id,
            scope,
            ttl_secs
        );

        AuthToken {
            subject_id: subject_id.to_string(),
            issued_at,
            expires_at,
            scope: scope.to_string(),
            signature: hex::encode(signature.to_bytes()),
        }
    }

    /// Check signature, expiry, and revocation. Rejection is final; a
    /// token is never extended or re-signed.
    pub fn validate(&self, token: &AuthToken) -> bool {
        if self.revoked.read().contains(&token.subject_id) {
            log::debug!("token rejected: subject {} revoked", token.subject_id);
            return false;
        }
        if Utc::now() >= token.expires_at {
            log::debug!("token rejected: expired at {}", token.expires_at);
            return false;
        }

        let sig_bytes = match hex::decode(&token.signature) {
            Ok(raw) => raw,
            Err(_) => return false,
        };
        let sig_array: [u8; 64] = match sig_bytes.try_into() {
            Ok(arr) => arr,
            Err(_) => return false,
        };
        let signature = Signature::from_bytes(&sig_array);
        let payload = AuthToken::payload(
            &token.subject_id,
            token.issued_at,
            token.expires_at,
            &token.scope,
        );
        self.signing_key
            .verifying_key()
            .verify(&payload, &signature)
            .is_ok()
    }

    /// Add a subject to the revocation list.
    pub fn revoke(&self, subject_id: &str) {
        self.revoked.write().insert(subject_id.to_string());
        log::info!("subject revoked: {}", subject_id);
    }

    pub fn unrevoke(&self, subject_id: &str) {
        self.revoked.write().remove(subject_id);
    }

    pub fn is_revoked(&self, subject_id: &str) -> bool {
        self.revoked.read().contains(subject_id)
    }

    /// Clear the revocation list (store wipe).
    pub fn clear_revocations(&self) {
        self.revoked.write().clear();
    }
}

impl Default for TokenIssuer {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_validate() {
        let issuer = TokenIssuer::new();
        let token = issuer.issue("u1", "login", 300);
        assert!(issuer.validate(&token));
        assert_eq!(token.ttl(), Duration::seconds(300));
    }

    #[test]
    fn test_expired_token_rejected() {
        let issuer = TokenIssuer::new();
        let token = issuer.issue("u1", "login", -1);
        assert!(!issuer.validate(&token));
    }

    #[test]
    fn test_tampered_subject_rejected() {
        let issuer = TokenIssuer::new();
        let mut token = issuer.issue("u1", "login", 300);
        token.subject_id = "u2".to_string();
        assert!(!issuer.validate(&token));
    }

    #[test]
    fn test_tampered_expiry_rejected() {
        let issuer = TokenIssuer::new();
        let mut token = issuer.issue("u1", "login", 300);
        token.expires_at = token.expires_at + Duration::seconds(3600);
        assert!(!issuer.validate(&token));
    }

    #[test]
    fn test_foreign_key_rejected() {
        let issuer = TokenIssuer::new();
        let other = TokenIssuer::new();
        let token = other.issue("u1", "login", 300);
        assert!(!issuer.validate(&token));
    }

    #[test]
    fn test_revocation() {
        let issuer = TokenIssuer::new();
        let token = issuer.issue("u1", "login", 300);
        issuer.revoke("u1");
        assert!(issuer.is_revoked("u1"));
        assert!(!issuer.validate(&token));

        issuer.unrevoke("u1");
        assert!(issuer.validate(&token));
    }

    #[test]
    fn test_garbage_signature_rejected() {
        let issuer = TokenIssuer::new();
        let mut token = issuer.issue("u1", "login", 300);
        token.signature = "not-hex".to_string();
        assert!(!issuer.validate(&token));
        token.signature = hex::encode([0u8; 16]);
        assert!(!issuer.validate(&token));
    }
}
