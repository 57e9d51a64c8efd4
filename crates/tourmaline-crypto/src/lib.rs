//! # tourmaline-crypto: key management for data at rest
//!
//! The rest of the core depends only on the [`KeyManager`] trait:
//! authenticated encryption, authenticated decryption, and key rotation.
//! Rotation introduces a new active key version without invalidating
//! ciphertext sealed under prior versions; prior versions stay decryptable
//! until explicitly retired.
//!
//! [`AesGcmKeyManager`] is the in-process implementation: AES-256-GCM with
//! per-version 32-byte keys, random 96-bit nonces, and HKDF-SHA256
//! derivation of rotated key material. Key bytes are zeroed from memory on
//! drop.
//!
//! # Integrity
//!
//! Decryption authenticates before releasing any plaintext. A tampered
//! ciphertext, tag, or nonce fails with [`CryptoError::Integrity`] — the
//! caller never sees partial or garbage plaintext.
//!
//! # Example
//!
//! ```
//! use tourmaline_crypto::{AesGcmKeyManager, KeyManager};
//!
//! let keys = AesGcmKeyManager::generate();
//! let sealed = keys.encrypt(b"756.1234.5678.97").unwrap();
//! assert_eq!(keys.decrypt(&sealed).unwrap(), b"756.1234.5678.97");
//!
//! let v2 = keys.rotate_keys().unwrap();
//! assert_eq!(sealed.key_version + 1, v2);
//! // Old ciphertext stays decryptable after rotation
//! assert_eq!(keys.decrypt(&sealed).unwrap(), b"756.1234.5678.97");
//! ```

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use hkdf::Hkdf;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// AES-GCM authentication tag length in bytes.
const TAG_LEN: usize = 16;

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// Authentication-tag mismatch: the ciphertext, tag, nonce, or key
    /// version does not match what was sealed. Never swallowed.
    #[error("Integrity check failed: ciphertext or authentication tag rejected")]
    Integrity,

    /// The sealed record references a key version this manager has never
    /// issued.
    #[error("Unknown key version {0}")]
    UnknownKeyVersion(u32),

    /// The key version existed but has been explicitly retired.
    #[error("Key version {0} has been retired")]
    KeyRetired(u32),

    /// The active key version cannot be retired while it is active.
    #[error("Cannot retire the active key version {0}")]
    RetireActive(u32),

    /// Underlying cipher failure that is not an authentication failure.
    #[error("Cipher operation failed: {0}")]
    Cipher(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;

// ============================================================================
// SealedRecord
// ============================================================================

/// An authenticated-encrypted value together with everything needed to
/// decrypt it later: nonce, authentication tag, and the key version it was
/// sealed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedRecord {
    /// Ciphertext without the authentication tag.
    pub ciphertext: Vec<u8>,
    /// 96-bit GCM nonce, unique per encryption.
    pub nonce: [u8; NONCE_LEN],
    /// 128-bit GCM authentication tag.
    pub auth_tag: [u8; TAG_LEN],
    /// Version of the key this record was sealed under.
    pub key_version: u32,
}

// ============================================================================
// KeyManager
// ============================================================================

/// Authenticated encryption and key rotation.
///
/// The core depends only on this trait; production may substitute an
/// HSM/KMS-backed implementation without touching callers.
pub trait KeyManager: Send + Sync {
    /// Encrypts plaintext under the current active key version.
    fn encrypt(&self, plaintext: &[u8]) -> Result<SealedRecord>;

    /// Decrypts a sealed record, authenticating before releasing plaintext.
    ///
    /// # Errors
    ///
    /// [`CryptoError::Integrity`] on tag mismatch,
    /// [`CryptoError::UnknownKeyVersion`] / [`CryptoError::KeyRetired`] when
    /// the record's key version is unavailable.
    fn decrypt(&self, sealed: &SealedRecord) -> Result<Vec<u8>>;

    /// Introduces a new active key version and returns it.
    ///
    /// Ciphertext sealed under prior versions remains decryptable until the
    /// version is retired with [`KeyManager::retire_version`].
    fn rotate_keys(&self) -> Result<u32>;

    /// Explicitly ends a key version's life. Records sealed under it become
    /// undecryptable.
    fn retire_version(&self, version: u32) -> Result<()>;

    /// Returns the current active key version.
    fn active_version(&self) -> u32;
}

// ============================================================================
// AesGcmKeyManager
// ============================================================================

/// Per-version key material, zeroed from memory when dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
struct KeyMaterial {
    key: [u8; 32],
}

#[derive(Default)]
struct KeyRing {
    keys: HashMap<u32, KeyMaterial>,
    retired: Vec<u32>,
    active: u32,
}

/// In-process [`KeyManager`] backed by AES-256-GCM.
///
/// Keeps one 32-byte key per version. Rotation derives fresh key material
/// with HKDF-SHA256 over new entropy, domain-separated by version number,
/// so versions are independent even under a weak entropy source.
pub struct AesGcmKeyManager {
    ring: RwLock<KeyRing>,
}

impl AesGcmKeyManager {
    /// Creates a manager with a freshly generated version-1 key.
    pub fn generate() -> Self {
        let key = derive_key(1);
        let mut keys = HashMap::new();
        keys.insert(1, KeyMaterial { key });

        Self {
            ring: RwLock::new(KeyRing {
                keys,
                retired: Vec::new(),
                active: 1,
            }),
        }
    }

    fn cipher_for(&self, version: u32) -> Result<Aes256Gcm> {
        let ring = self.ring.read().expect("key ring lock poisoned");

        if ring.retired.contains(&version) {
            return Err(CryptoError::KeyRetired(version));
        }

        let material = ring
            .keys
            .get(&version)
            .ok_or(CryptoError::UnknownKeyVersion(version))?;

        Aes256Gcm::new_from_slice(&material.key).map_err(|e| CryptoError::Cipher(e.to_string()))
    }
}

impl KeyManager for AesGcmKeyManager {
    fn encrypt(&self, plaintext: &[u8]) -> Result<SealedRecord> {
        let version = self.active_version();
        let cipher = self.cipher_for(version)?;

        let mut nonce = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce);

        let payload = Payload {
            msg: plaintext,
            aad: &version.to_le_bytes(),
        };

        let mut combined = cipher
            .encrypt(Nonce::from_slice(&nonce), payload)
            .map_err(|e| CryptoError::Cipher(e.to_string()))?;

        // aes-gcm appends the 16-byte tag; split it out so the sealed
        // record carries tag and ciphertext separately.
        debug_assert!(combined.len() >= TAG_LEN);
        let tag_start = combined.len() - TAG_LEN;
        let mut auth_tag = [0u8; TAG_LEN];
        auth_tag.copy_from_slice(&combined[tag_start..]);
        combined.truncate(tag_start);

        Ok(SealedRecord {
            ciphertext: combined,
            nonce,
            auth_tag,
            key_version: version,
        })
    }

    fn decrypt(&self, sealed: &SealedRecord) -> Result<Vec<u8>> {
        let cipher = self.cipher_for(sealed.key_version)?;

        let mut combined = Vec::with_capacity(sealed.ciphertext.len() + TAG_LEN);
        combined.extend_from_slice(&sealed.ciphertext);
        combined.extend_from_slice(&sealed.auth_tag);

        let payload = Payload {
            msg: &combined,
            aad: &sealed.key_version.to_le_bytes(),
        };

        cipher
            .decrypt(Nonce::from_slice(&sealed.nonce), payload)
            .map_err(|_| CryptoError::Integrity)
    }

    fn rotate_keys(&self) -> Result<u32> {
        let mut ring = self.ring.write().expect("key ring lock poisoned");

        let next = ring.active + 1;
        ring.keys.insert(next, KeyMaterial {
            key: derive_key(next),
        });
        ring.active = next;

        tracing::info!(version = next, "key rotation: new active key version");
        Ok(next)
    }

    fn retire_version(&self, version: u32) -> Result<()> {
        let mut ring = self.ring.write().expect("key ring lock poisoned");

        if version == ring.active {
            return Err(CryptoError::RetireActive(version));
        }
        if !ring.keys.contains_key(&version) {
            return Err(CryptoError::UnknownKeyVersion(version));
        }
        if !ring.retired.contains(&version) {
            ring.retired.push(version);
            ring.keys.remove(&version);
        }

        tracing::info!(version, "key version retired");
        Ok(())
    }

    fn active_version(&self) -> u32 {
        self.ring.read().expect("key ring lock poisoned").active
    }
}

/// Derives 32 bytes of key material from fresh entropy.
///
/// HKDF-SHA256 with the version number as info gives domain separation
/// between versions on top of the entropy itself.
fn derive_key(version: u32) -> [u8; 32] {
    let mut ikm = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut ikm);

    let hk = Hkdf::<Sha256>::new(Some(b"tourmaline-key-ring"), &ikm);
    let mut okm = [0u8; 32];
    hk.expand(&version.to_le_bytes(), &mut okm)
        .expect("32-byte output within HKDF maximum");

    ikm.zeroize();
    okm
}

// ============================================================================
// Tests
// ============================================================================
