//! At-rest encryption using ChaCha20-Poly1305 AEAD
//!
//! Every encrypted blob the store writes goes through [`ProfileCipher`].
//! Blobs are stored as text, so the binary ciphertext is base64 encoded
//! into a single token.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::VaultError;
use crate::fingerprint::EnvironmentFingerprint;

/// Nonce size for ChaCha20-Poly1305 (12 bytes)
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size for ChaCha20-Poly1305 (16 bytes)
pub const TAG_SIZE: usize = 16;

/// Symmetric cipher for persisted profile and settings blobs.
///
/// # Token Format
///
/// `base64([nonce (12 bytes)] + [ciphertext + auth_tag (16 bytes)])`
///
/// A fresh nonce is drawn for every call to [`encrypt`](Self::encrypt), so
/// encrypting the same plaintext twice yields two different tokens.
///
/// # Example
///
/// ```
/// use profilevault_core::crypto::ProfileCipher;
///
/// let cipher = ProfileCipher::new(&[7u8; 32]);
///
/// let token = cipher.encrypt(b"Hello, World!").unwrap();
/// let decrypted = cipher.decrypt(&token).unwrap();
///
/// assert_eq!(decrypted, b"Hello, World!");
/// ```
#[derive(Clone)]
pub struct ProfileCipher {
    cipher: ChaCha20Poly1305,
}

impl std::fmt::Debug for ProfileCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileCipher")
            .field("cipher", &"<ChaCha20Poly1305>")
            .finish()
    }
}

impl ProfileCipher {
    /// Create a cipher with an explicit 32-byte key.
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(key.into()),
        }
    }

    /// Create a cipher whose key is derived from the given environment.
    ///
    /// The same fingerprint always yields the same key.
    pub fn from_fingerprint(fingerprint: &EnvironmentFingerprint) -> Self {
        Self::new(&fingerprint.derive_key())
    }

    /// Create a cipher keyed by the current process environment.
    pub fn from_environment() -> Self {
        Self::from_fingerprint(&EnvironmentFingerprint::detect())
    }

    /// Encrypt bytes into a text token.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, VaultError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| VaultError::Crypto(format!("Encryption failed: {}", e)))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);

        Ok(STANDARD.encode(sealed))
    }

    /// Decrypt a token produced by [`encrypt`](Self::encrypt).
    ///
    /// Fails with [`VaultError::Crypto`] on malformed base64, truncated
    /// input, a wrong key, or tampered data.
    pub fn decrypt(&self, token: &str) -> Result<Vec<u8>, VaultError> {
        let sealed = STANDARD
            .decode(token.trim())
            .map_err(|e| VaultError::Crypto(format!("Malformed token: {}", e)))?;

        if sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(VaultError::Crypto(
                "Token too short to contain nonce and tag".to_string(),
            ));
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);

        self.cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| VaultError::Crypto(format!("Decryption failed: {}", e)))
    }

    /// Serialize a value to JSON and encrypt it.
    pub fn encrypt_object<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, VaultError> {
        let json = serde_json::to_vec(value)
            .map_err(|e| VaultError::Serialization(e.to_string()))?;
        self.encrypt(&json)
    }

    /// Decrypt a token and deserialize the JSON inside it.
    ///
    /// A token that decrypts but does not hold the expected shape is still a
    /// [`VaultError::Crypto`]: from the caller's point of view the blob is
    /// unreadable either way.
    pub fn decrypt_object<T: DeserializeOwned>(&self, token: &str) -> Result<T, VaultError> {
        let json = self.decrypt(token)?;
        serde_json::from_slice(&json)
            .map_err(|e| VaultError::Crypto(format!("Malformed payload: {}", e)))
    }
}
