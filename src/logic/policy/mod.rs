//! Engine Policy
//!
//! Per-deployment tuning: similarity threshold, token TTL, capture window,
//! decay policy, index bands, nonce retention. Export/import round-trips
//! JSON; an invalid policy is rejected whole, never partially applied.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CAPTURE_TIMEOUT_MS, DEFAULT_INDEX_BANDS, DEFAULT_MIN_WINDOW_MS,
    DEFAULT_NONCE_TTL_SECS, DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_TOKEN_TTL_SECS,
};
use crate::error::{AuthError, AuthResult};
use crate::logic::index::lsh::MAX_BANDS;
use crate::logic::template::DecayPolicy;

// ============================================================================
// POLICY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnginePolicy {
    /// Acceptance threshold on cosine similarity, in (0, 1]
    pub similarity_threshold: f32,

    /// Auth token lifetime (seconds)
    pub token_ttl_secs: i64,

    /// Minimum telemetry window span before extraction (milliseconds)
    pub min_window_ms: u64,

    /// Capture deadline (milliseconds)
    pub capture_timeout_ms: u64,

    /// Replay nonce retention (seconds)
    pub nonce_ttl_secs: i64,

    /// LSH band count (recall/latency knob)
    pub index_bands: usize,

    /// Adaptive template maintenance
    pub decay: DecayPolicy,
}

impl Default for EnginePolicy {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            min_window_ms: DEFAULT_MIN_WINDOW_MS,
            capture_timeout_ms: DEFAULT_CAPTURE_TIMEOUT_MS,
            nonce_ttl_secs: DEFAULT_NONCE_TTL_SECS,
            index_bands: DEFAULT_INDEX_BANDS,
            decay: DecayPolicy::default(),
        }
    }
}

impl EnginePolicy {
    /// Strict-sensitivity preset (higher threshold, no adaptation).
    pub fn strict() -> Self {
        Self {
            similarity_threshold: 0.92,
            decay: DecayPolicy {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn validate(&self) -> AuthResult<()> {
        if !(self.similarity_threshold.is_finite()
            && self.similarity_threshold > 0.0
            && self.similarity_threshold <= 1.0)
        {
            return Err(AuthError::PolicyError(format!(
                "similarity_threshold must be in (0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if self.token_ttl_secs <= 0 {
            return Err(AuthError::PolicyError(
                "token_ttl_secs must be positive".to_string(),
            ));
        }
        if self.min_window_ms == 0 {
            return Err(AuthError::PolicyError(
                "min_window_ms must be positive".to_string(),
            ));
        }
        if self.capture_timeout_ms < self.min_window_ms {
            return Err(AuthError::PolicyError(
                "capture_timeout_ms must be at least min_window_ms".to_string(),
            ));
        }
        if self.nonce_ttl_secs <= 0 {
            return Err(AuthError::PolicyError(
                "nonce_ttl_secs must be positive".to_string(),
            ));
        }
        if self.index_bands == 0 || self.index_bands > MAX_BANDS {
            return Err(AuthError::PolicyError(format!(
                "index_bands must be in 1..={}",
                MAX_BANDS
            )));
        }
        self.decay.validate()
    }

    /// Serialize for the admin export API.
    pub fn export(&self) -> AuthResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate an imported policy. Returns the parsed policy
    /// only when every field checks out.
    pub fn import(json: &str) -> AuthResult<Self> {
        let policy: Self = serde_json::from_str(json)
            .map_err(|e| AuthError::PolicyError(format!("parse: {}", e)))?;
        policy.validate()?;
        Ok(policy)
    }
}

// ============================================================================
// TESTS
// ============================================================================
