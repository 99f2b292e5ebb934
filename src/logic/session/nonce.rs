//! Replay Nonce Cache
//!
//! Process-wide, TTL-bounded record of every nonce an authentication
//! attempt has consumed. `check_and_insert` is a single atomic step under
//! one lock, so two racing sessions can never both claim the same nonce.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{AuthError, AuthResult};

/// Nonce width in bytes.
pub const NONCE_LEN: usize = 32;

pub struct NonceCache {
    /// nonce -> expiry unix timestamp
    entries: Mutex<HashMap<[u8; NONCE_LEN], i64>>,
}

impl NonceCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Fresh random nonce.
    pub fn generate() -> [u8; NONCE_LEN] {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        nonce
    }

    /// Claim a nonce for one verification. Fails with `ReplayDetected` if
    /// the nonce is already present and unexpired. Expired entries are
    /// pruned on the way in so the cache stays bounded by the TTL window.
    pub fn check_and_insert(&self, nonce: &[u8; NONCE_LEN], ttl_secs: i64) -> AuthResult<()> {
        let now = Utc::now().timestamp();
        let mut entries = self.entries.lock();

        entries.retain(|_, expiry| *expiry > now);

        if entries.contains_key(nonce) {
            log::warn!("nonce replay detected");
            return Err(AuthError::ReplayDetected);
        }
        entries.insert(*nonce, now + ttl_secs);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Default for NonceCache {
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
    use std::sync::Arc;

    #[test]
    fn test_fresh_nonce_accepted_once() {
        let cache = NonceCache::new();
        let nonce = NonceCache::generate();
        assert!(cache.check_and_insert(&nonce, 600).is_ok());
        assert!(matches!(
            cache.check_and_insert(&nonce, 600),
            Err(AuthError::ReplayDetected)
        ));
    }

    #[test]
    fn test_expired_nonce_is_pruned() {
        let cache = NonceCache::new();
        let nonce = NonceCache::generate();
        // Already expired on insert
        cache.check_and_insert(&nonce, -1).unwrap();
        // Pruned, so a second use is accepted
        assert!(cache.check_and_insert(&nonce, 600).is_ok());
    }

    #[test]
    fn test_generate_is_not_constant() {
        assert_ne!(NonceCache::generate(), NonceCache::generate());
    }

    #[test]
    fn test_racing_sessions_cannot_share_a_nonce() {
        let cache = Arc::new(NonceCache::new());
        let nonce = NonceCache::generate();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.check_and_insert(&nonce, 600).is_ok())
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&won| won)
            .count();
        assert_eq!(wins, 1, "exactly one session may claim a nonce");
    }
}
