//! Banded LSH Similarity Index
//!
//! Approximate top-k identity lookup over one-way sketches. `bands` 16-bit
//! sub-sketch tables trade recall against latency: more bands, more chances
//! for a near neighbor to collide, more buckets to probe.
//!
//! Costs: insert/remove O(bands); query O(bands + candidates) with a full
//! sketch scan (256-bit Hamming per entry) as the completeness fallback
//! when no band collides. Recall rises monotonically with `bands`.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};
use crate::logic::features::{layout_hash, validate_layout, FeatureVector, EXTRACTOR_VERSION};

use super::sketch::Sketch;

/// Maximum usable bands: 256-bit sketch / 16-bit band keys.
pub const MAX_BANDS: usize = 16;

// ============================================================================
// INDEX
// ============================================================================

#[derive(Debug)]
pub struct SimilarityIndex {
    bands: usize,
    tables: Vec<HashMap<u16, HashSet<String>>>,
    sketches: HashMap<String, Sketch>,
}

impl SimilarityIndex {
    pub fn new(bands: usize) -> AuthResult<Self> {
        if bands == 0 || bands > MAX_BANDS {
            return Err(AuthError::PolicyError(format!(
                "index bands must be in 1..={}, got {}",
                MAX_BANDS, bands
            )));
        }
        Ok(Self {
            bands,
            tables: vec![HashMap::new(); bands],
            sketches: HashMap::new(),
        })
    }

    /// Insert or replace the entry for an identity.
    pub fn insert(&mut self, identity_id: &str, vector: &FeatureVector) {
        self.remove(identity_id);
        let sketch = Sketch::of(vector);
        for band in 0..self.bands {
            self.tables[band]
                .entry(sketch.band_key(band))
                .or_default()
                .insert(identity_id.to_string());
        }
        self.sketches.insert(identity_id.to_string(), sketch);
        log::debug!("index insert: {} ({} entries)", identity_id, self.len());
    }

    /// Remove an identity. No-op if absent.
    pub fn remove(&mut self, identity_id: &str) {
        let Some(sketch) = self.sketches.remove(identity_id) else {
            return;
        };
        for band in 0..self.bands {
            let key = sketch.band_key(band);
            if let Some(bucket) = self.tables[band].get_mut(&key) {
                bucket.remove(identity_id);
                if bucket.is_empty() {
                    self.tables[band].remove(&key);
                }
            }
        }
    }

    /// Top-k identities by estimated cosine, descending. Finite and
    /// restartable; callers may re-query at will.
    pub fn query(&self, vector: &FeatureVector, k: usize) -> Vec<(String, f32)> {
        if k == 0 || self.sketches.is_empty() {
            return Vec::new();
        }
        let probe = Sketch::of(vector);

        let mut candidates: HashSet<&String> = HashSet::new();
        for band in 0..self.bands {
            if let Some(bucket) = self.tables[band].get(&probe.band_key(band)) {
                candidates.extend(bucket.iter());
            }
        }
        // No band collision: scan every sketch so a match is never missed
        if candidates.is_empty() {
            candidates.extend(self.sketches.keys());
        }

        let mut ranked: Vec<(String, f32)> = candidates
            .into_iter()
            .map(|id| {
                let sim = probe.estimated_cosine(&self.sketches[id]);
                (id.clone(), sim)
            })
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(k);
        ranked
    }

    pub fn len(&self) -> usize {
        self.sketches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sketches.is_empty()
    }

    pub fn contains(&self, identity_id: &str) -> bool {
        self.sketches.contains_key(identity_id)
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    pub fn clear(&mut self) {
        self.tables = vec![HashMap::new(); self.bands];
        self.sketches.clear();
    }

    // ========================================================================
    // SNAPSHOT
    // ========================================================================

    pub fn snapshot(&self) -> IndexSnapshot {
        IndexSnapshot {
            extractor_version: EXTRACTOR_VERSION,
            layout_hash: layout_hash(),
            bands: self.bands,
            entries: self
                .sketches
                .iter()
                .map(|(id, sketch)| (id.clone(), *sketch))
                .collect(),
        }
    }

    /// Rebuild from a snapshot, rejecting incompatible extractor layouts.
    pub fn restore(snapshot: IndexSnapshot) -> AuthResult<Self> {
        validate_layout(snapshot.extractor_version, snapshot.layout_hash)?;
        let mut index = Self::new(snapshot.bands)?;
        for (id, sketch) in snapshot.entries {
            for band in 0..index.bands {
                index.tables[band]
                    .entry(sketch.band_key(band))
                    .or_default()
                    .insert(id.clone());
            }
            index.sketches.insert(id, sketch);
        }
        Ok(index)
    }
}

/// Serialized index state: sketches only, never vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub extractor_version: u8,
    pub layout_hash: u32,
    pub bands: usize,
    pub entries: Vec<(String, Sketch)>,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::features::FEATURE_DIM;

    fn basis(idx: usize) -> FeatureVector {
        let mut values = vec![0.0f32; FEATURE_DIM];
        values[idx] = 1.0;
        FeatureVector::from_values(values)
    }

    fn perturbed(idx: usize) -> FeatureVector {
        let mut values = vec![0.0f32; FEATURE_DIM];
        values[idx] = 1.0;
        values[(idx + 1) % FEATURE_DIM] = 0.05;
        FeatureVector::from_values(values)
    }

    fn populated(n: usize) -> SimilarityIndex {
        let mut index = SimilarityIndex::new(8).unwrap();
        for i in 0..n {
            index.insert(&format!("user-{}", i), &basis(i));
        }
        index
    }

    #[test]
    fn test_bounds_on_bands() {
        assert!(SimilarityIndex::new(0).is_err());
        assert!(SimilarityIndex::new(17).is_err());
        assert!(SimilarityIndex::new(16).is_ok());
    }

    #[test]
    fn test_query_ranks_enrolled_identity_first() {
        let index = populated(10);
        let results = index.query(&perturbed(3), 3);
        assert_eq!(results[0].0, "user-3");
        assert!(results[0].1 > 0.9);
        // Ordered descending
        assert!(results.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn test_query_is_restartable() {
        let index = populated(5);
        let a = index.query(&perturbed(2), 2);
        let b = index.query(&perturbed(2), 2);
        assert_eq!(a, b);
    }

    #[test]
    fn test_remove_drops_identity() {
        let mut index = populated(4);
        index.remove("user-1");
        assert!(!index.contains("user-1"));
        assert_eq!(index.len(), 3);
        let results = index.query(&perturbed(1), 4);
        assert!(results.iter().all(|(id, _)| id != "user-1"));
    }

    #[test]
    fn test_insert_replaces_existing_entry() {
        let mut index = populated(2);
        index.insert("user-0", &basis(9));
        assert_eq!(index.len(), 2);
        let results = index.query(&perturbed(9), 1);
        assert_eq!(results[0].0, "user-0");
    }

    #[test]
    fn test_fallback_scan_never_misses() {
        let index = populated(6);
        // A far-away probe may collide with no band; results still arrive
        let results = index.query(&basis(100), 6);
        assert_eq!(results.len(), 6);
    }

    #[test]
    fn test_query_k_zero_and_empty_index() {
        let index = populated(3);
        assert!(index.query(&basis(0), 0).is_empty());
        let empty = SimilarityIndex::new(8).unwrap();
        assert!(empty.query(&basis(0), 5).is_empty());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let index = populated(5);
        let json = serde_json::to_string(&index.snapshot()).unwrap();
        let snapshot: IndexSnapshot = serde_json::from_str(&json).unwrap();
        let restored = SimilarityIndex::restore(snapshot).unwrap();
        assert_eq!(restored.len(), 5);
        assert_eq!(restored.query(&perturbed(4), 1)[0].0, "user-4");
    }

    #[test]
    fn test_restore_rejects_stale_layout() {
        let index = populated(2);
        let mut snapshot = index.snapshot();
        snapshot.extractor_version += 1;
        assert!(SimilarityIndex::restore(snapshot).is_err());
    }
}
