//! Engine Facade
//!
//! Composes the store, index, proof engine, session machine, token issuer
//! and audit trail behind the library's public API: enroll, authenticate,
//! and the admin/lifecycle operations.

use std::path::PathBuf;
use std::sync::mpsc::Receiver;

use parking_lot::RwLock;

use crate::constants::APP_NAME;
use crate::error::{AuthError, AuthResult};
use crate::logic::audit::{AuditEvent, AuditKind, AuditRecorder};
use crate::logic::index::SimilarityIndex;
use crate::logic::policy::EnginePolicy;
use crate::logic::session::{
    run_authentication, run_enrollment, verify_proof_once, EnrollmentOutcome, InFlightGuard,
    NonceCache, SessionDeps, NONCE_LEN,
};
use crate::logic::telemetry::{CancelToken, TelemetryEvent};
use crate::logic::template::{TemplateStore, TemplateSummary};
use crate::logic::token::{AuthToken, TokenIssuer};
use crate::logic::zkp::SimilarityProof;

// ============================================================================
// CONFIG
// ============================================================================

pub struct AuthEngineConfig {
    /// Root data directory. Defaults to the platform data dir.
    pub data_dir: Option<PathBuf>,
    /// Device-bound secret the storage key is derived from. Must come from
    /// the platform keystore; it never leaves the device.
    pub device_secret: Vec<u8>,
    pub policy: EnginePolicy,
}

impl AuthEngineConfig {
    pub fn new(device_secret: &[u8]) -> Self {
        Self {
            data_dir: None,
            device_secret: device_secret.to_vec(),
            policy: EnginePolicy::default(),
        }
    }

    pub fn with_data_dir(mut self, dir: PathBuf) -> Self {
        self.data_dir = Some(dir);
        self
    }

    pub fn with_policy(mut self, policy: EnginePolicy) -> Self {
        self.policy = policy;
        self
    }

    fn resolve_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_NAME)
        })
    }
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct AuthEngine {
    store: TemplateStore,
    index: RwLock<SimilarityIndex>,
    nonces: NonceCache,
    audit: AuditRecorder,
    issuer: TokenIssuer,
    guard: InFlightGuard,
    policy: RwLock<EnginePolicy>,
}

impl AuthEngine {
    pub fn new(config: AuthEngineConfig) -> AuthResult<Self> {
        config.policy.validate()?;
        if config.device_secret.is_empty() {
            return Err(AuthError::PolicyError(
                "device secret must not be empty".to_string(),
            ));
        }

        let root = config.resolve_data_dir();
        let store = TemplateStore::open(&root.join("templates"), &config.device_secret)?;
        let audit = AuditRecorder::new(&root.join("audit"))?;

        // Restore the persisted index, or start fresh with the policy's bands
        let index = match store.load_index()? {
            Some(snapshot) => SimilarityIndex::restore(snapshot)?,
            None => SimilarityIndex::new(config.policy.index_bands)?,
        };

        audit.record(AuditEvent::new(
            AuditKind::EngineStart,
            &format!("engine started (v{})", crate::constants::APP_VERSION),
        ));
        log::info!(
            "auth engine up: {} enrolled identit(ies), {} index entries",
            store.len(),
            index.len()
        );

        Ok(Self {
            store,
            index: RwLock::new(index),
            nonces: NonceCache::new(),
            audit,
            issuer: TokenIssuer::new(),
            guard: InFlightGuard::new(),
            policy: RwLock::new(config.policy),
        })
    }

    fn deps(&self) -> SessionDeps<'_> {
        SessionDeps {
            store: &self.store,
            index: &self.index,
            nonces: &self.nonces,
            audit: &self.audit,
            issuer: &self.issuer,
            guard: &self.guard,
        }
    }

    // ========================================================================
    // ENROLLMENT API
    // ========================================================================

    /// Enroll a new identity from a telemetry stream. Fails with
    /// `AlreadyEnrolled` if a template exists.
    pub fn enroll(
        &self,
        identity_id: &str,
        events: &Receiver<TelemetryEvent>,
    ) -> AuthResult<EnrollmentOutcome> {
        self.enroll_with_options(identity_id, events, false, &CancelToken::new())
    }

    /// Enrollment with explicit re-enroll flag and cancellation token.
    pub fn enroll_with_options(
        &self,
        identity_id: &str,
        events: &Receiver<TelemetryEvent>,
        re_enroll: bool,
        cancel: &CancelToken,
    ) -> AuthResult<EnrollmentOutcome> {
        let policy = self.policy.read().clone();
        run_enrollment(&self.deps(), &policy, identity_id, events, re_enroll, cancel)
    }

    // ========================================================================
    // AUTHENTICATION API
    // ========================================================================

    /// Authenticate from a telemetry stream. With no claimed identity the
    /// similarity index picks the candidate template.
    pub fn authenticate(
        &self,
        claimed_identity: Option<&str>,
        events: &Receiver<TelemetryEvent>,
    ) -> AuthResult<AuthToken> {
        self.authenticate_with_cancel(claimed_identity, events, &CancelToken::new())
    }

    pub fn authenticate_with_cancel(
        &self,
        claimed_identity: Option<&str>,
        events: &Receiver<TelemetryEvent>,
        cancel: &CancelToken,
    ) -> AuthResult<AuthToken> {
        let policy = self.policy.read().clone();
        run_authentication(&self.deps(), &policy, claimed_identity, events, cancel)
    }

    /// Verify an externally-held (proof, nonce) pair once. Reusing the
    /// nonce yields `ReplayDetected`, never a grant.
    pub fn verify_proof(
        &self,
        identity_id: &str,
        proof: &SimilarityProof,
        nonce: &[u8; NONCE_LEN],
    ) -> AuthResult<()> {
        let policy = self.policy.read().clone();
        verify_proof_once(&self.deps(), &policy, identity_id, proof, nonce)
    }

    /// Validate a previously issued token (signature, expiry, revocation).
    pub fn validate_token(&self, token: &AuthToken) -> bool {
        self.issuer.validate(token)
    }

    /// Public half of the device signing key, for external validators.
    pub fn verifying_key(&self) -> ed25519_dalek::VerifyingKey {
        self.issuer.verifying_key()
    }

    // ========================================================================
    // ADMIN / LIFECYCLE API
    // ========================================================================

    /// Revoke an identity: drop its template and index entry, refuse its
    /// outstanding tokens. Returns whether a template existed.
    pub fn revoke_identity(&self, identity_id: &str) -> AuthResult<bool> {
        self.issuer.revoke(identity_id);
        let existed = self.store.remove(identity_id)?;
        {
            let mut index = self.index.write();
            index.remove(identity_id);
            self.store.save_index(&index.snapshot())?;
        }

        self.audit.record(
            AuditEvent::new(AuditKind::IdentityRevoked, "identity revoked")
                .with_identity(identity_id),
        );
        Ok(existed)
    }

    /// Device loss/reset: destroy every template, the index, the replay
    /// cache, and the revocation list.
    pub fn wipe_all_data(&self) -> AuthResult<()> {
        self.store.wipe_all()?;
        self.index.write().clear();
        self.nonces.clear();
        self.issuer.clear_revocations();

        self.audit
            .record(AuditEvent::new(AuditKind::StoreWiped, "all data wiped"));
        Ok(())
    }

    /// Export the active policy as JSON.
    pub fn export_policy(&self) -> AuthResult<String> {
        self.policy.read().export()
    }

    /// Import a policy. Validation failures leave the active policy
    /// untouched. A changed band count rebuilds the index from the
    /// enrolled reference vectors.
    pub fn import_policy(&self, json: &str) -> AuthResult<()> {
        let imported = EnginePolicy::import(json)?;

        let rebuild = imported.index_bands != self.index.read().bands();
        if rebuild {
            let mut fresh = SimilarityIndex::new(imported.index_bands)?;
            for summary in self.store.summaries() {
                if let Some(record) = self.store.get(&summary.identity_id) {
                    fresh.insert(&record.identity_id, &record.reference_vector()?);
                }
            }
            self.store.save_index(&fresh.snapshot())?;
            *self.index.write() = fresh;
        }

        *self.policy.write() = imported;
        log::info!("policy imported (index rebuild: {})", rebuild);
        Ok(())
    }

    pub fn template_summaries(&self) -> Vec<TemplateSummary> {
        self.store.summaries()
    }

    pub fn enrolled_count(&self) -> usize {
        self.store.len()
    }
}

impl Drop for AuthEngine {
    fn drop(&mut self) {
        self.audit
            .record(AuditEvent::new(AuditKind::EngineStop, "engine stopped"));
        self.audit.flush();
    }
}

// ============================================================================
// TESTS
// ============================================================================
