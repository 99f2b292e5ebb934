//! Template Store
//!
//! Encrypted local persistence: one AES-256-GCM envelope per enrolled
//! identity plus one for the index snapshot, all under a key derived from
//! the device secret. The in-memory map is the read authority; disk writes
//! are temp-file + rename so a crash never leaves a half-written record.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{AuthError, AuthResult};
use crate::logic::index::IndexSnapshot;

use super::types::{TemplateRecord, TemplateSummary};

const KEY_DOMAIN: &[u8] = b"behavioral-auth/store-key/v1";
const TEMPLATE_EXT: &str = "tpl";
const INDEX_FILE: &str = "index.snapshot";
const FORMAT_VERSION: u32 = 1;

// ============================================================================
// ENVELOPE
// ============================================================================

/// On-disk file format: hex nonce + base64 ciphertext inside a small JSON
/// wrapper, so a partial write is detectable as a parse failure.
#[derive(Debug, Serialize, Deserialize)]
struct EncryptedFile {
    nonce: String,
    ciphertext: String,
    format_version: u32,
}

// ============================================================================
// STORE
// ============================================================================

pub struct TemplateStore {
    dir: PathBuf,
    cipher: Aes256Gcm,
    records: RwLock<HashMap<String, TemplateRecord>>,
}

impl TemplateStore {
    /// Open (or create) a store rooted at `dir`, keyed by the device secret.
    ///
    /// Every readable record is loaded eagerly; an undecryptable record is
    /// a hard error, not a skip — fail closed on tampering.
    pub fn open(dir: &Path, device_secret: &[u8]) -> AuthResult<Self> {
        fs::create_dir_all(dir)?;

        let mut hasher = Sha256::new();
        hasher.update(KEY_DOMAIN);
        hasher.update(device_secret);
        let key_bytes = hasher.finalize();
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));

        let store = Self {
            dir: dir.to_path_buf(),
            cipher,
            records: RwLock::new(HashMap::new()),
        };

        let mut loaded = 0usize;
        for entry in fs::read_dir(&store.dir)? {
            let path = entry?.path();
            if path.extension().map_or(false, |e| e == TEMPLATE_EXT) {
                let record: TemplateRecord = store.read_envelope(&path, b"template")?;
                store
                    .records
                    .write()
                    .insert(record.identity_id.clone(), record);
                loaded += 1;
            }
        }
        log::info!("template store opened: {} record(s) at {:?}", loaded, store.dir);

        Ok(store)
    }

    // ========================================================================
    // TEMPLATE OPERATIONS
    // ========================================================================

    /// First enrollment: fails with `AlreadyEnrolled` if a record exists.
    pub fn create(&self, record: TemplateRecord) -> AuthResult<()> {
        {
            let records = self.records.read();
            if records.contains_key(&record.identity_id) {
                return Err(AuthError::AlreadyEnrolled);
            }
        }
        self.persist(record)
    }

    /// Re-enrollment or adaptive update: replaces any existing record.
    pub fn upsert(&self, record: TemplateRecord) -> AuthResult<()> {
        self.persist(record)
    }

    pub fn get(&self, identity_id: &str) -> Option<TemplateRecord> {
        self.records.read().get(identity_id).cloned()
    }

    pub fn contains(&self, identity_id: &str) -> bool {
        self.records.read().contains_key(identity_id)
    }

    /// Record a successful verification. Never called on a failed attempt.
    pub fn touch_verified(&self, identity_id: &str, when: DateTime<Utc>) -> AuthResult<()> {
        let mut record = self
            .get(identity_id)
            .ok_or(AuthError::TemplateNotFound)?;
        record.last_verified_at = Some(when);
        self.persist(record)
    }

    pub fn remove(&self, identity_id: &str) -> AuthResult<bool> {
        let existed = self.records.write().remove(identity_id).is_some();
        let path = self.template_path(identity_id);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        if existed {
            log::info!("template removed: {}", identity_id);
        }
        Ok(existed)
    }

    /// Destroy every template and the index snapshot.
    pub fn wipe_all(&self) -> AuthResult<()> {
        self.records.write().clear();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_ours = path.extension().map_or(false, |e| e == TEMPLATE_EXT)
                || path.file_name().map_or(false, |n| n == INDEX_FILE);
            if is_ours {
                fs::remove_file(&path)?;
            }
        }
        log::warn!("template store wiped at {:?}", self.dir);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn summaries(&self) -> Vec<TemplateSummary> {
        self.records.read().values().map(|r| r.summary()).collect()
    }

    // ========================================================================
    // INDEX SNAPSHOT
    // ========================================================================

    pub fn save_index(&self, snapshot: &IndexSnapshot) -> AuthResult<()> {
        self.write_envelope(&self.dir.join(INDEX_FILE), snapshot, b"index")
    }

    pub fn load_index(&self) -> AuthResult<Option<IndexSnapshot>> {
        let path = self.dir.join(INDEX_FILE);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(self.read_envelope(&path, b"index")?))
    }

    // ========================================================================
    // INTERNAL
    // ========================================================================

    /// Disk first, then memory: a failed write leaves the previous record
    /// (memory and disk) fully intact.
    fn persist(&self, mut record: TemplateRecord) -> AuthResult<()> {
        record.record_version += 1;
        let path = self.template_path(&record.identity_id);
        self.write_envelope(&path, &record, b"template")?;
        self.records
            .write()
            .insert(record.identity_id.clone(), record);
        Ok(())
    }

    fn template_path(&self, identity_id: &str) -> PathBuf {
        // Hash the id so arbitrary identity strings cannot shape paths
        let digest = Sha256::digest(identity_id.as_bytes());
        self.dir
            .join(format!("{}.{}", hex::encode(&digest[..16]), TEMPLATE_EXT))
    }

    fn write_envelope<T: Serialize>(&self, path: &Path, value: &T, aad: &[u8]) -> AuthResult<()> {
        let plaintext = serde_json::to_vec(value)?;

        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: &plaintext,
                    aad,
                },
            )
            .map_err(|_| AuthError::StorageError("encryption failed".to_string()))?;

        let file = EncryptedFile {
            nonce: hex::encode(nonce_bytes),
            ciphertext: base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                &ciphertext,
            ),
            format_version: FORMAT_VERSION,
        };

        // Atomic replace
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec(&file)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn read_envelope<T: for<'de> Deserialize<'de>>(&self, path: &Path, aad: &[u8]) -> AuthResult<T> {
        let raw = fs::read(path)?;
        let file: EncryptedFile = serde_json::from_slice(&raw)?;
        if file.format_version != FORMAT_VERSION {
            return Err(AuthError::StorageError(format!(
                "unsupported envelope version {}",
                file.format_version
            )));
        }

        let nonce_bytes = hex::decode(&file.nonce)
            .map_err(|e| AuthError::StorageError(format!("nonce decode: {}", e)))?;
        if nonce_bytes.len() != 12 {
            return Err(AuthError::StorageError("nonce must be 12 bytes".to_string()));
        }
        let ciphertext =
            base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &file.ciphertext)
                .map_err(|e| AuthError::StorageError(format!("ciphertext decode: {}", e)))?;

        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: &ciphertext,
                    aad,
                },
            )
            .map_err(|_| {
                AuthError::StorageError(format!("decryption failed for {:?} (wrong key or tampered)", path))
            })?;

        Ok(serde_json::from_slice(&plaintext)?)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::features::{FeatureVector, FEATURE_DIM};
    use crate::logic::template::types::DecayPolicy;
    use crate::logic::zkp::commit;
    use tempfile::TempDir;

    fn sample_record(id: &str) -> TemplateRecord {
        let mut values = vec![0.0f32; FEATURE_DIM];
        values[0] = 1.0;
        let v = FeatureVector::from_values(values);
        let (commitment, blinding) = commit(&v).unwrap();
        TemplateRecord::new(id, commitment, &blinding, &v, 0.85, DecayPolicy::default())
    }

    #[test]
    fn test_create_and_reload() {
        let dir = TempDir::new().unwrap();
        let store = TemplateStore::open(dir.path(), b"device-secret").unwrap();
        store.create(sample_record("u1")).unwrap();

        // Fresh store instance reads the same record back
        let store2 = TemplateStore::open(dir.path(), b"device-secret").unwrap();
        let record = store2.get("u1").unwrap();
        assert_eq!(record.identity_id, "u1");
        assert_eq!(record.record_version, 1);
        assert!(record.reference_vector().is_ok());
    }

    #[test]
    fn test_duplicate_enrollment_rejected_and_original_kept() {
        let dir = TempDir::new().unwrap();
        let store = TemplateStore::open(dir.path(), b"device-secret").unwrap();
        store.create(sample_record("u1")).unwrap();
        let original = store.get("u1").unwrap();

        let result = store.create(sample_record("u1"));
        assert!(matches!(result, Err(AuthError::AlreadyEnrolled)));
        // Untouched
        let after = store.get("u1").unwrap();
        assert_eq!(after.record_version, original.record_version);
        assert_eq!(after.commitment, original.commitment);
    }

    #[test]
    fn test_upsert_replaces() {
        let dir = TempDir::new().unwrap();
        let store = TemplateStore::open(dir.path(), b"device-secret").unwrap();
        store.create(sample_record("u1")).unwrap();
        store.upsert(sample_record("u1")).unwrap();
        assert_eq!(store.len(), 1);
        // record_version keeps moving forward
        assert_eq!(store.get("u1").unwrap().record_version, 1);
    }

    #[test]
    fn test_wrong_device_key_fails_closed() {
        let dir = TempDir::new().unwrap();
        {
            let store = TemplateStore::open(dir.path(), b"device-secret").unwrap();
            store.create(sample_record("u1")).unwrap();
        }
        let result = TemplateStore::open(dir.path(), b"other-secret");
        assert!(matches!(result, Err(AuthError::StorageError(_))));
    }

    #[test]
    fn test_tampered_file_fails_closed() {
        let dir = TempDir::new().unwrap();
        let path;
        {
            let store = TemplateStore::open(dir.path(), b"device-secret").unwrap();
            store.create(sample_record("u1")).unwrap();
            path = store.template_path("u1");
        }
        // Flip a ciphertext byte
        let raw = fs::read_to_string(&path).unwrap();
        let mut file: EncryptedFile = serde_json::from_str(&raw).unwrap();
        let mut ct = base64::Engine::decode(
            &base64::engine::general_purpose::STANDARD,
            &file.ciphertext,
        )
        .unwrap();
        ct[0] ^= 0x01;
        file.ciphertext =
            base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &ct);
        fs::write(&path, serde_json::to_string(&file).unwrap()).unwrap();

        let result = TemplateStore::open(dir.path(), b"device-secret");
        assert!(matches!(result, Err(AuthError::StorageError(_))));
    }

    #[test]
    fn test_touch_verified_bumps_version() {
        let dir = TempDir::new().unwrap();
        let store = TemplateStore::open(dir.path(), b"device-secret").unwrap();
        store.create(sample_record("u1")).unwrap();

        let when = Utc::now();
        store.touch_verified("u1", when).unwrap();
        let record = store.get("u1").unwrap();
        assert_eq!(record.last_verified_at, Some(when));
        assert_eq!(record.record_version, 2);
    }

    #[test]
    fn test_remove_and_wipe() {
        let dir = TempDir::new().unwrap();
        let store = TemplateStore::open(dir.path(), b"device-secret").unwrap();
        store.create(sample_record("u1")).unwrap();
        store.create(sample_record("u2")).unwrap();

        assert!(store.remove("u1").unwrap());
        assert!(!store.remove("u1").unwrap());
        assert_eq!(store.len(), 1);

        store.wipe_all().unwrap();
        assert!(store.is_empty());
        let store2 = TemplateStore::open(dir.path(), b"device-secret").unwrap();
        assert!(store2.is_empty());
    }

    #[test]
    fn test_raw_files_never_contain_plaintext() {
        let dir = TempDir::new().unwrap();
        let store = TemplateStore::open(dir.path(), b"device-secret").unwrap();
        let record = sample_record("u1");
        let blinding_hex = record.blinding_hex.clone();
        store.create(record).unwrap();

        for entry in fs::read_dir(dir.path()).unwrap() {
            let content = fs::read_to_string(entry.unwrap().path()).unwrap();
            assert!(!content.contains(&blinding_hex));
            assert!(!content.contains("identity_id"));
            assert!(!content.contains("similarity_threshold"));
        }
    }

    #[test]
    fn test_index_snapshot_round_trip() {
        use crate::logic::index::SimilarityIndex;

        let dir = TempDir::new().unwrap();
        let store = TemplateStore::open(dir.path(), b"device-secret").unwrap();

        let mut values = vec![0.0f32; FEATURE_DIM];
        values[0] = 1.0;
        let v = FeatureVector::from_values(values);
        let mut index = SimilarityIndex::new(8).unwrap();
        index.insert("u1", &v);

        store.save_index(&index.snapshot()).unwrap();
        let snapshot = store.load_index().unwrap().unwrap();
        let restored = SimilarityIndex::restore(snapshot).unwrap();
        assert!(restored.contains("u1"));
    }

    #[test]
    fn test_missing_index_is_none() {
        let dir = TempDir::new().unwrap();
        let store = TemplateStore::open(dir.path(), b"device-secret").unwrap();
        assert!(store.load_index().unwrap().is_none());
    }
}
