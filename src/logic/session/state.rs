//! Authentication State Machine
//!
//! Explicit session pipeline: Idle -> Enrolling -> Enrolled and
//! Idle -> Authenticating -> Granted | Rejected -> Idle. All state lives in
//! a `SessionContext` passed through the pipeline; the only shared
//! structures are the template store, the similarity index, and the replay
//! nonce cache, each with its own locking discipline.
//!
//! Failure policy: enrollment surfaces typed errors to the caller;
//! authentication collapses every signal-derived failure to
//! `AuthenticationRejected` and leaves the real reason in the audit trail.
//! `ReplayDetected` and `Cancelled` pass through untouched — they say
//! nothing about similarity.

use std::collections::HashSet;
use std::sync::mpsc::Receiver;
use std::thread;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult, ProofFailure};
use crate::logic::audit::{AuditEvent, AuditKind, AuditRecorder};
use crate::logic::features::{extract, FeatureVector};
use crate::logic::index::SimilarityIndex;
use crate::logic::policy::EnginePolicy;
use crate::logic::telemetry::{capture_window, CancelToken, TelemetryEvent};
use crate::logic::template::{TemplateRecord, TemplateStore, TemplateSummary};
use crate::logic::token::{AuthToken, TokenIssuer};
use crate::logic::zkp::{self, SimilarityProof};

use super::nonce::{NonceCache, NONCE_LEN};

/// Scope stamped into session tokens.
const TOKEN_SCOPE: &str = "session";

// ============================================================================
// SESSION STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Enrolling,
    Enrolled,
    Authenticating,
    Granted,
    Rejected,
}

impl SessionState {
    /// Legal state machine edges. Nothing may be skipped or re-ordered.
    fn can_transition(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Enrolling)
                | (Enrolling, Enrolled)
                | (Enrolling, Idle)
                | (Idle, Authenticating)
                | (Enrolled, Authenticating)
                | (Authenticating, Granted)
                | (Authenticating, Rejected)
                | (Granted, Idle)
                | (Rejected, Idle)
        )
    }
}

/// Per-session mutable state. One per enrollment or authentication call;
/// never shared between sessions.
#[derive(Debug)]
pub struct SessionContext {
    pub session_id: String,
    pub identity_id: Option<String>,
    pub state: SessionState,
}

impl SessionContext {
    pub fn new(identity_id: Option<&str>) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            identity_id: identity_id.map(|s| s.to_string()),
            state: SessionState::Idle,
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_transition(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        log::trace!(
            "session {}: {:?} -> {:?}",
            self.session_id,
            self.state,
            next
        );
        self.state = next;
    }
}

// ============================================================================
// IN-FLIGHT GUARD
// ============================================================================

/// Enforces a single in-flight attempt per identity. Mutating a template or
/// proving against it while another session does the same would race the
/// proof/nonce pipeline.
#[derive(Debug, Default)]
pub struct InFlightGuard {
    active: Mutex<HashSet<String>>,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, identity_id: &str) -> AuthResult<IdentityPermit<'_>> {
        let mut active = self.active.lock();
        if !active.insert(identity_id.to_string()) {
            return Err(AuthError::AttemptInFlight);
        }
        Ok(IdentityPermit {
            guard: self,
            identity_id: identity_id.to_string(),
        })
    }
}

/// RAII permit; releases the identity on drop.
pub struct IdentityPermit<'a> {
    guard: &'a InFlightGuard,
    identity_id: String,
}

impl Drop for IdentityPermit<'_> {
    fn drop(&mut self) {
        self.guard.active.lock().remove(&self.identity_id);
    }
}

// ============================================================================
// OUTCOMES & DEPENDENCIES
// ============================================================================

/// Successful enrollment result.
#[derive(Debug, Clone)]
pub struct EnrollmentOutcome {
    pub session_id: String,
    pub template: TemplateSummary,
}

/// Shared engine structures a session borrows for its lifetime.
pub struct SessionDeps<'a> {
    pub store: &'a TemplateStore,
    pub index: &'a RwLock<SimilarityIndex>,
    pub nonces: &'a NonceCache,
    pub audit: &'a AuditRecorder,
    pub issuer: &'a TokenIssuer,
    pub guard: &'a InFlightGuard,
}

// ============================================================================
// ENROLLMENT
// ============================================================================

/// Run one enrollment session: capture, extract, commit, persist template
/// and index entry as a single transaction. Any failure rolls back to the
/// pre-session state and surfaces the typed error.
pub fn run_enrollment(
    deps: &SessionDeps<'_>,
    policy: &EnginePolicy,
    identity_id: &str,
    events: &Receiver<TelemetryEvent>,
    re_enroll: bool,
    cancel: &CancelToken,
) -> AuthResult<EnrollmentOutcome> {
    let mut ctx = SessionContext::new(Some(identity_id));
    ctx.transition(SessionState::Enrolling);

    match enroll_pipeline(deps, policy, &mut ctx, identity_id, events, re_enroll, cancel) {
        Ok(outcome) => {
            ctx.transition(SessionState::Enrolled);
            deps.audit.record(
                AuditEvent::new(AuditKind::EnrollmentSucceeded, "template enrolled")
                    .with_session(&ctx.session_id)
                    .with_identity(identity_id),
            );
            Ok(outcome)
        }
        Err(err) => {
            ctx.transition(SessionState::Idle);
            deps.audit.record(
                AuditEvent::new(AuditKind::EnrollmentFailed, "enrollment aborted")
                    .with_session(&ctx.session_id)
                    .with_identity(identity_id)
                    .with_reason(err.reason_code()),
            );
            Err(err)
        }
    }
}

fn enroll_pipeline(
    deps: &SessionDeps<'_>,
    policy: &EnginePolicy,
    ctx: &mut SessionContext,
    identity_id: &str,
    events: &Receiver<TelemetryEvent>,
    re_enroll: bool,
    cancel: &CancelToken,
) -> AuthResult<EnrollmentOutcome> {
    let _permit = deps.guard.acquire(identity_id)?;

    if !re_enroll && deps.store.contains(identity_id) {
        return Err(AuthError::AlreadyEnrolled);
    }
    // Keep the previous record around for rollback on re-enrollment
    let previous = deps.store.get(identity_id);

    let window = capture_window(
        events,
        crate::constants::TELEMETRY_CAPACITY,
        policy.min_window_ms,
        policy.capture_timeout_ms,
        cancel,
    )?;
    let vector = extract(&window, policy.min_window_ms)?;
    if cancel.is_cancelled() {
        return Err(AuthError::Cancelled);
    }

    let (commitment, blinding) = zkp::commit(&vector)?;
    let record = TemplateRecord::new(
        identity_id,
        commitment,
        &blinding,
        &vector,
        policy.similarity_threshold,
        policy.decay,
    );
    let summary_pending = record.summary();

    if re_enroll {
        deps.store.upsert(record)?;
    } else {
        deps.store.create(record)?;
    }

    // Index insert + snapshot persist, with compensating rollback so a
    // failure leaves no partial state behind. The write lock is held across
    // the save so snapshots hit disk in insertion order.
    {
        let mut index = deps.index.write();
        let snapshot_before = index.snapshot();
        index.insert(identity_id, &vector);
        if let Err(err) = deps.store.save_index(&index.snapshot()) {
            log::error!("index persist failed, rolling back enrollment: {}", err);
            *index = SimilarityIndex::restore(snapshot_before)?;
            match previous {
                Some(old) => deps.store.upsert(old)?,
                None => {
                    deps.store.remove(identity_id)?;
                }
            }
            return Err(err);
        }
    }

    // The persisted record carries the bumped version
    let template = deps
        .store
        .get(identity_id)
        .map(|r| r.summary())
        .unwrap_or(summary_pending);

    Ok(EnrollmentOutcome {
        session_id: ctx.session_id.clone(),
        template,
    })
}

// ============================================================================
// AUTHENTICATION
// ============================================================================

/// Run one authentication session. Returns a signed token on success.
///
/// Every signal-derived failure surfaces as `AuthenticationRejected`;
/// `ReplayDetected` and `Cancelled` pass through. A failed attempt never
/// touches the template.
pub fn run_authentication(
    deps: &SessionDeps<'_>,
    policy: &EnginePolicy,
    claimed_identity: Option<&str>,
    events: &Receiver<TelemetryEvent>,
    cancel: &CancelToken,
) -> AuthResult<AuthToken> {
    let mut ctx = SessionContext::new(claimed_identity);
    ctx.transition(SessionState::Authenticating);

    match auth_pipeline(deps, policy, &mut ctx, claimed_identity, events, cancel) {
        Ok(token) => {
            ctx.transition(SessionState::Granted);
            deps.audit.record(
                AuditEvent::new(AuditKind::AuthenticationGranted, "proof verified")
                    .with_session(&ctx.session_id)
                    .with_identity(&token.subject_id),
            );
            ctx.transition(SessionState::Idle);
            Ok(token)
        }
        Err(err) => {
            ctx.transition(SessionState::Rejected);
            let kind = match err {
                AuthError::ReplayDetected => AuditKind::ReplayDetected,
                _ => AuditKind::AuthenticationRejected,
            };
            let mut event = AuditEvent::new(kind, "authentication attempt failed")
                .with_session(&ctx.session_id)
                .with_reason(err.reason_code());
            if let Some(id) = ctx.identity_id.as_deref() {
                event = event.with_identity(id);
            }
            deps.audit.record(event);
            ctx.transition(SessionState::Idle);

            // Collapse all signal-derived reasons; protocol-level outcomes
            // pass through unchanged
            match err {
                AuthError::ReplayDetected | AuthError::Cancelled => Err(err),
                _ => Err(AuthError::AuthenticationRejected),
            }
        }
    }
}

fn auth_pipeline(
    deps: &SessionDeps<'_>,
    policy: &EnginePolicy,
    ctx: &mut SessionContext,
    claimed_identity: Option<&str>,
    events: &Receiver<TelemetryEvent>,
    cancel: &CancelToken,
) -> AuthResult<AuthToken> {
    let window = capture_window(
        events,
        crate::constants::TELEMETRY_CAPACITY,
        policy.min_window_ms,
        policy.capture_timeout_ms,
        cancel,
    )?;
    let current = extract(&window, policy.min_window_ms)?;

    // Resolve the identity: claimed, or the index's best candidate
    let identity_id = match claimed_identity {
        Some(id) => id.to_string(),
        None => deps
            .index
            .read()
            .query(&current, 1)
            .into_iter()
            .next()
            .map(|(id, _)| id)
            .ok_or(AuthError::TemplateNotFound)?,
    };
    ctx.identity_id = Some(identity_id.clone());

    let _permit = deps.guard.acquire(&identity_id)?;

    let record = deps
        .store
        .get(&identity_id)
        .ok_or(AuthError::TemplateNotFound)?;
    let reference = record.reference_vector()?;
    let blinding = record.blinding()?;
    let threshold = record.similarity_threshold;

    // Fresh nonce, claimed atomically before any proof work
    let nonce = NonceCache::generate();
    deps.nonces.check_and_insert(&nonce, policy.nonce_ttl_secs)?;

    if cancel.is_cancelled() {
        return Err(AuthError::Cancelled);
    }

    // Proof construction is compute-bound; run it on its own worker so this
    // session never blocks another session's capture
    let proof = {
        let current = current.clone();
        let handle =
            thread::spawn(move || zkp::prove(&current, &reference, &blinding, threshold, &nonce));
        handle.join().map_err(|_| {
            log::error!("proof worker panicked");
            AuthError::ProofConstructionError(ProofFailure::MalformedInput)
        })??
    };

    if cancel.is_cancelled() {
        return Err(AuthError::Cancelled);
    }

    if !zkp::verify(&proof, &record.commitment, threshold, &nonce) {
        return Err(AuthError::VerificationFailed);
    }

    let token = deps
        .issuer
        .issue(&identity_id, TOKEN_SCOPE, policy.token_ttl_secs);
    let now = Utc::now();
    deps.store.touch_verified(&identity_id, now)?;

    maybe_decay_update(deps, ctx, &record, &current, now);

    Ok(token)
}

/// Adaptive decay: when due, blend the fresh vector into the reference and
/// re-enroll under a new commitment. Runs after the grant; a failure here
/// is logged and audited but never revokes the granted token.
fn maybe_decay_update(
    deps: &SessionDeps<'_>,
    ctx: &SessionContext,
    record: &TemplateRecord,
    current: &FeatureVector,
    now: chrono::DateTime<Utc>,
) {
    if !record.decay.enabled {
        return;
    }
    let anchor = record.last_verified_at.unwrap_or(record.created_at);
    if (now - anchor).num_seconds() < record.decay.half_life_secs {
        return;
    }

    let result = (|| -> AuthResult<()> {
        let reference = record.reference_vector()?;
        let alpha = record.decay.blend_alpha;
        let blended: Vec<f32> = current
            .as_slice()
            .iter()
            .zip(reference.as_slice().iter())
            .map(|(c, r)| alpha * c + (1.0 - alpha) * r)
            .collect();
        let mut blended = FeatureVector::from_values(blended);
        blended.l2_normalize();

        // Same soundness rules as enrollment: fresh blinding, fresh
        // commitment, index entry refreshed
        let (commitment, blinding) = zkp::commit(&blended)?;
        let mut updated = TemplateRecord::new(
            &record.identity_id,
            commitment,
            &blinding,
            &blended,
            record.similarity_threshold,
            record.decay,
        );
        updated.created_at = record.created_at;
        updated.last_verified_at = Some(now);
        updated.record_version = deps
            .store
            .get(&record.identity_id)
            .map(|r| r.record_version)
            .unwrap_or(record.record_version);
        deps.store.upsert(updated)?;

        let mut index = deps.index.write();
        index.insert(&record.identity_id, &blended);
        deps.store.save_index(&index.snapshot())?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            deps.audit.record(
                AuditEvent::new(AuditKind::TemplateUpdated, "adaptive decay re-commit")
                    .with_session(&ctx.session_id)
                    .with_identity(&record.identity_id),
            );
        }
        Err(err) => {
            log::error!(
                "adaptive update failed for {}: {}",
                record.identity_id,
                err
            );
        }
    }
}

// ============================================================================
// PROOF RE-VERIFICATION
// ============================================================================

/// Verify an externally-held (proof, nonce) pair against an enrolled
/// identity, consuming the nonce. A second call with the same nonce yields
/// `ReplayDetected` regardless of the proof's validity.
pub fn verify_proof_once(
    deps: &SessionDeps<'_>,
    policy: &EnginePolicy,
    identity_id: &str,
    proof: &SimilarityProof,
    nonce: &[u8; NONCE_LEN],
) -> AuthResult<()> {
    let record = deps
        .store
        .get(identity_id)
        .ok_or(AuthError::TemplateNotFound)?;

    deps.nonces.check_and_insert(nonce, policy.nonce_ttl_secs)?;

    if zkp::verify(proof, &record.commitment, record.similarity_threshold, nonce) {
        Ok(())
    } else {
        Err(AuthError::VerificationFailed)
    }
}

// ============================================================================
// TESTS
// ============================================================================
