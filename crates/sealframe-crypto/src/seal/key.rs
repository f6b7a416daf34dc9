//! Per-vault symmetric keys
//!
//! # Security Properties
//!
//! - One key per vault, never reused
//! - Key bytes are zeroized when the key is dropped
//! - `Debug` never prints key material

use std::fmt;

use zeroize::Zeroize;

use super::error::CryptoError;

/// Size of a vault key in bytes (XChaCha20-Poly1305 key size)
pub const KEY_SIZE: usize = 32;

/// Ephemeral symmetric key protecting exactly one vault.
///
/// Held privately by the creator until unlock, then serialized with
/// [`to_bytes`](Self::to_bytes) and broadcast. Peers rebuild it with
/// [`from_bytes`](Self::from_bytes).
pub struct SecretKey {
    bytes: [u8; KEY_SIZE],
}

impl SecretKey {
    /// Build a fresh key from caller-provided random bytes.
    ///
    /// Caller MUST provide cryptographically secure random bytes in
    /// production.
    pub fn from_random(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Deserialize a key received in an unlock message.
    ///
    /// # Errors
    ///
    /// - `InvalidKeyLength`: If `bytes` is not exactly [`KEY_SIZE`] long
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKeyLength { expected: KEY_SIZE, actual: bytes.len() }
        })?;
        Ok(Self { bytes })
    }

    /// Serialize the key for broadcast.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }

    /// Raw key bytes for the AEAD.
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}
