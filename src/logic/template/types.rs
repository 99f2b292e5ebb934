//! Template Types
//!
//! One reference template per enrolled identity. The full record — including
//! the quantized reference vector and the blinding secret — exists in
//! plaintext only inside the trusted process; at rest it lives inside one
//! AES-256-GCM envelope under the device-bound key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_DECAY_BLEND_ALPHA, DEFAULT_DECAY_HALF_LIFE_SECS};
use crate::error::{AuthError, AuthResult};
use crate::logic::features::{validate_layout, FeatureVector, FEATURE_DIM};
use crate::logic::zkp::{BlindingSecret, Commitment};

// ============================================================================
// DECAY POLICY
// ============================================================================

/// Adaptive template maintenance. When enabled, a successful verification
/// older than the half-life triggers a blend-and-recommit of the stored
/// reference toward the fresh vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayPolicy {
    pub enabled: bool,
    pub half_life_secs: i64,
    /// Weight of the fresh vector in the blend, in (0, 1)
    pub blend_alpha: f32,
}

impl Default for DecayPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            half_life_secs: DEFAULT_DECAY_HALF_LIFE_SECS,
            blend_alpha: DEFAULT_DECAY_BLEND_ALPHA,
        }
    }
}

impl DecayPolicy {
    pub fn validate(&self) -> AuthResult<()> {
        if self.half_life_secs <= 0 {
            return Err(AuthError::PolicyError(
                "decay half_life_secs must be positive".to_string(),
            ));
        }
        if !(self.blend_alpha > 0.0 && self.blend_alpha < 1.0) {
            return Err(AuthError::PolicyError(
                "decay blend_alpha must be in (0, 1)".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// TEMPLATE RECORD
// ============================================================================

/// The full enrolled-identity record.
///
/// `reference` and `blinding_hex` never leave the encrypted envelope; the
/// commitment (and the index sketch derived at enrollment) are the only
/// artifacts visible outside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub identity_id: String,
    pub extractor_version: u8,
    pub layout_hash: u32,
    pub commitment: Commitment,
    pub blinding_hex: String,
    pub reference: Vec<f32>,
    pub similarity_threshold: f32,
    pub created_at: DateTime<Utc>,
    pub last_verified_at: Option<DateTime<Utc>>,
    pub decay: DecayPolicy,
    /// Bumped on every successful write (read-after-write token)
    pub record_version: u64,
}

impl TemplateRecord {
    pub fn new(
        identity_id: &str,
        commitment: Commitment,
        blinding: &BlindingSecret,
        reference: &FeatureVector,
        similarity_threshold: f32,
        decay: DecayPolicy,
    ) -> Self {
        Self {
            identity_id: identity_id.to_string(),
            extractor_version: reference.version,
            layout_hash: reference.layout_hash,
            commitment,
            blinding_hex: hex::encode(blinding.to_bytes()),
            reference: reference.as_slice().to_vec(),
            similarity_threshold,
            created_at: Utc::now(),
            last_verified_at: None,
            decay,
            record_version: 0,
        }
    }

    /// Reconstruct the reference vector, checking layout compatibility.
    pub fn reference_vector(&self) -> AuthResult<FeatureVector> {
        validate_layout(self.extractor_version, self.layout_hash)?;
        if self.reference.len() != FEATURE_DIM {
            return Err(AuthError::StorageError(format!(
                "template for {} has {} dims, expected {}",
                self.identity_id,
                self.reference.len(),
                FEATURE_DIM
            )));
        }
        Ok(FeatureVector::from_values(self.reference.clone()))
    }

    /// Reconstruct the blinding secret.
    pub fn blinding(&self) -> AuthResult<BlindingSecret> {
        let raw = hex::decode(&self.blinding_hex)
            .map_err(|e| AuthError::StorageError(format!("blinding decode: {}", e)))?;
        let bytes: [u8; 32] = raw
            .try_into()
            .map_err(|_| AuthError::StorageError("blinding must be 32 bytes".to_string()))?;
        BlindingSecret::from_bytes(bytes)
            .ok_or_else(|| AuthError::StorageError("non-canonical blinding scalar".to_string()))
    }

    /// Public summary, safe to expose to callers and the audit log.
    pub fn summary(&self) -> TemplateSummary {
        TemplateSummary {
            identity_id: self.identity_id.clone(),
            extractor_version: self.extractor_version,
            similarity_threshold: self.similarity_threshold,
            created_at: self.created_at,
            last_verified_at: self.last_verified_at,
            record_version: self.record_version,
        }
    }
}

/// Metadata-only view of a template. No commitment, no secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateSummary {
    pub identity_id: String,
    pub extractor_version: u8,
    pub similarity_threshold: f32,
    pub created_at: DateTime<Utc>,
    pub last_verified_at: Option<DateTime<Utc>>,
    pub record_version: u64,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::zkp::commit;

    fn sample_vector() -> FeatureVector {
        let mut values = vec![0.0f32; FEATURE_DIM];
        values[0] = 0.6;
        values[1] = 0.8;
        FeatureVector::from_values(values)
    }

    fn sample_record() -> TemplateRecord {
        let v = sample_vector();
        let (commitment, blinding) = commit(&v).unwrap();
        TemplateRecord::new("u1", commitment, &blinding, &v, 0.85, DecayPolicy::default())
    }

    #[test]
    fn test_record_round_trips_vector_and_blinding() {
        let record = sample_record();
        let v = record.reference_vector().unwrap();
        assert_eq!(v.as_slice(), sample_vector().as_slice());
        assert!(record.blinding().is_ok());
    }

    #[test]
    fn test_stale_layout_rejected() {
        let mut record = sample_record();
        record.extractor_version += 1;
        assert!(matches!(
            record.reference_vector(),
            Err(AuthError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_truncated_reference_rejected() {
        let mut record = sample_record();
        record.reference.truncate(10);
        assert!(matches!(
            record.reference_vector(),
            Err(AuthError::StorageError(_))
        ));
    }

    #[test]
    fn test_decay_policy_validation() {
        assert!(DecayPolicy::default().validate().is_ok());
        let bad = DecayPolicy {
            blend_alpha: 1.5,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = DecayPolicy {
            half_life_secs: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_summary_excludes_secrets() {
        let record = sample_record();
        let json = serde_json::to_string(&record.summary()).unwrap();
        assert!(!json.contains(&record.blinding_hex));
        assert!(!json.contains("reference"));
    }
}
