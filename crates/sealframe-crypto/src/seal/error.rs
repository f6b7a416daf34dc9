//! Error types for vault sealing

use thiserror::Error;

/// Errors from the cipher adapter
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Serialized key has the wrong number of bytes
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected key length
        expected: usize,
        /// Actual key length
        actual: usize,
    },

    /// Sealed payload cannot even hold nonce, marker and tag
    #[error("sealed payload truncated: {len} bytes, need at least {min}")]
    Truncated {
        /// Length of the sealed payload
        len: usize,
        /// Minimum length of any sealed payload
        min: usize,
    },

    /// AEAD authentication failed (wrong key or modified ciphertext)
    #[error("decryption failed: authentication tag mismatch")]
    DecryptionFailed,

    /// Ciphertext authenticated but did not start with the known value
    #[error("known-value marker mismatch")]
    KnownValueMismatch,
}

impl CryptoError {
    /// Returns true if this error indicates sealed bytes were forged or
    /// corrupted, as opposed to a malformed key encoding.
    pub fn is_tamper_signal(&self) -> bool {
        match self {
            Self::Truncated { .. } | Self::DecryptionFailed | Self::KnownValueMismatch => true,
            Self::InvalidKeyLength { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_failures_are_tamper_signals() {
        assert!(CryptoError::DecryptionFailed.is_tamper_signal());
        assert!(CryptoError::KnownValueMismatch.is_tamper_signal());
        assert!(CryptoError::Truncated { len: 3, min: 56 }.is_tamper_signal());
    }

    #[test]
    fn bad_key_encoding_is_not_a_tamper_signal() {
        let err = CryptoError::InvalidKeyLength { expected: 32, actual: 7 };
        assert!(!err.is_tamper_signal());
    }

    #[test]
    fn error_display() {
        let err = CryptoError::InvalidKeyLength { expected: 32, actual: 7 };
        assert_eq!(err.to_string(), "invalid key length: expected 32, got 7");
    }
}
