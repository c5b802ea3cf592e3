//! Symmetric encryption for guild configuration values at rest.
//!
//! Uses ChaCha20-Poly1305 with a single process-wide key. Every ciphertext
//! carries its own random nonce and is encoded as `base64(nonce || sealed)`.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;
use zeroize::Zeroizing;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Cipher errors
#[derive(Debug, Error)]
pub enum CipherError {
    #[error("Invalid base64 encoding: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Encryption key must be 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("Ciphertext too short")]
    Truncated,

    #[error("Decryption failed - invalid ciphertext or wrong key")]
    DecryptionFailed,

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decrypted value is not valid UTF-8")]
    InvalidUtf8,
}

/// Result type for cipher operations
pub type CipherResult<T> = Result<T, CipherError>;

/// Process-wide secret cipher.
///
/// Built once at startup; cheap to share behind an `Arc`.
pub struct SecretCipher {
    key: Zeroizing<[u8; KEY_LEN]>,
}

impl SecretCipher {
    /// Build a cipher from raw key bytes.
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self {
            key: Zeroizing::new(key),
        }
    }

    /// Parse a base64 encoded 32-byte key.
    pub fn from_base64(encoded: &str) -> CipherResult<Self> {
        let bytes = Zeroizing::new(BASE64.decode(encoded.trim())?);
        if bytes.len() != KEY_LEN {
            return Err(CipherError::InvalidKeyLength(bytes.len()));
        }
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&bytes);
        Ok(Self::new(key))
    }

    /// Generate a fresh random key, base64 encoded.
    #[cfg(test)]
    pub fn generate_key() -> String {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut key[..]);
        BASE64.encode(&key[..])
    }

    fn aead(&self) -> CipherResult<ChaCha20Poly1305> {
        ChaCha20Poly1305::new_from_slice(&self.key[..])
            .map_err(|_| CipherError::InvalidKeyLength(KEY_LEN))
    }

    /// Seal raw bytes, returning `nonce || ciphertext`.
    pub fn seal(&self, plaintext: &[u8]) -> CipherResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let sealed = self
            .aead()?
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|_| CipherError::EncryptionFailed)?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Open bytes produced by [`SecretCipher::seal`].
    pub fn open(&self, data: &[u8]) -> CipherResult<Vec<u8>> {
        if data.len() < NONCE_LEN {
            return Err(CipherError::Truncated);
        }
        let (nonce, sealed) = data.split_at(NONCE_LEN);
        self.aead()?
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CipherError::DecryptionFailed)
    }

    /// Encrypt a string value to base64 text.
    pub fn encrypt(&self, plaintext: &str) -> CipherResult<String> {
        Ok(BASE64.encode(self.seal(plaintext.as_bytes())?))
    }

    /// Decrypt base64 text produced by [`SecretCipher::encrypt`].
    pub fn decrypt(&self, ciphertext: &str) -> CipherResult<String> {
        let data = BASE64.decode(ciphertext.trim())?;
        let plain = self.open(&data)?;
        String::from_utf8(plain).map_err(|_| CipherError::InvalidUtf8)
    }
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCipher").finish_non_exhaustive()
    }
}
