//! Sealing and opening vault payloads using `XChaCha20-Poly1305`
//!
//! All functions are pure - the nonce must be provided by the caller.
//! This keeps simulation runs deterministic.

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};
use zeroize::Zeroizing;

use super::{error::CryptoError, key::SecretKey};

/// Size of the random nonce prepended to every sealed payload (24 bytes)
pub const NONCE_SIZE: usize = 24;

/// Poly1305 tag size (16 bytes)
const POLY1305_TAG_SIZE: usize = 16;

/// Fixed plaintext prefix checked after every decryption.
///
/// Shared protocol constant: peers running a different marker cannot open
/// each other's vaults.
pub const KNOWN_VALUE_MARKER: &[u8; 16] = b"sealframe/kv/v01";

/// Bytes added by [`seal`] on top of the plaintext length.
pub const SEAL_OVERHEAD: usize = NONCE_SIZE + KNOWN_VALUE_MARKER.len() + POLY1305_TAG_SIZE;

/// Seal a plaintext under a vault key.
///
/// Returns `nonce ++ ciphertext`, where the ciphertext covers
/// `KNOWN_VALUE_MARKER ++ plaintext` and carries the 16-byte Poly1305 tag.
///
/// # Security
///
/// - Caller MUST provide a fresh random nonce for every seal
/// - The marker-prefixed plaintext buffer is zeroized before returning
pub fn seal(key: &SecretKey, plaintext: &[u8], nonce: [u8; NONCE_SIZE]) -> Vec<u8> {
    let mut marked = Zeroizing::new(Vec::with_capacity(KNOWN_VALUE_MARKER.len() + plaintext.len()));
    marked.extend_from_slice(KNOWN_VALUE_MARKER);
    marked.extend_from_slice(plaintext);

    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    let Ok(ciphertext) = cipher.encrypt(XNonce::from_slice(&nonce), marked.as_slice()) else {
        unreachable!("XChaCha20-Poly1305 encryption cannot fail with valid inputs");
    };

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);

    debug_assert_eq!(sealed.len(), plaintext.len() + SEAL_OVERHEAD);
    sealed
}

/// Open a sealed payload with a revealed vault key.
///
/// Returns the original plaintext with the marker stripped.
///
/// # Errors
///
/// - `Truncated`: If `sealed` is shorter than [`SEAL_OVERHEAD`]
/// - `DecryptionFailed`: If the key is wrong or any byte was modified
/// - `KnownValueMismatch`: If the decrypted bytes do not start with
///   [`KNOWN_VALUE_MARKER`]
pub fn open(key: &SecretKey, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < SEAL_OVERHEAD {
        return Err(CryptoError::Truncated { len: sealed.len(), min: SEAL_OVERHEAD });
    }

    let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    let marked = Zeroizing::new(
        cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)?,
    );

    marked
        .strip_prefix(KNOWN_VALUE_MARKER.as_slice())
        .map(<[u8]>::to_vec)
        .ok_or(CryptoError::KnownValueMismatch)
}

#[cfg(test)]
mod tests {
    use super::{super::key::KEY_SIZE, *};

    fn test_key(seed: u8) -> SecretKey {
        let mut bytes = [0u8; KEY_SIZE];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = (i as u8).wrapping_add(seed);
        }
        SecretKey::from_random(bytes)
    }

    #[test]
    fn seal_open_roundtrip() {
        let key = test_key(0);
        let sealed = seal(&key, b"hello", [0xAB; NONCE_SIZE]);

        assert_eq!(open(&key, &sealed).unwrap(), b"hello");
    }

    #[test]
    fn seal_open_empty_plaintext() {
        let key = test_key(1);
        let sealed = seal(&key, b"", [0x00; NONCE_SIZE]);

        assert_eq!(sealed.len(), SEAL_OVERHEAD);
        assert_eq!(open(&key, &sealed).unwrap(), b"");
    }

    #[test]
    fn sealed_layout_starts_with_nonce() {
        let key = test_key(2);
        let nonce = [0x42; NONCE_SIZE];
        let sealed = seal(&key, b"payload", nonce);

        assert_eq!(&sealed[..NONCE_SIZE], &nonce);
        assert_eq!(sealed.len(), b"payload".len() + SEAL_OVERHEAD);
    }

    #[test]
    fn sealed_bytes_do_not_contain_plaintext() {
        let key = test_key(3);
        let plaintext = b"very recognisable secret";
        let sealed = seal(&key, plaintext, [0x00; NONCE_SIZE]);

        assert!(!sealed.windows(plaintext.len()).any(|w| w == plaintext));
        assert!(!sealed.windows(KNOWN_VALUE_MARKER.len()).any(|w| w == KNOWN_VALUE_MARKER));
    }

    #[test]
    fn different_nonces_produce_different_ciphertexts() {
        let key = test_key(4);
        let a = seal(&key, b"same", [0x00; NONCE_SIZE]);
        let b = seal(&key, b"same", [0xFF; NONCE_SIZE]);

        assert_ne!(a[NONCE_SIZE..], b[NONCE_SIZE..]);
    }

    #[test]
    fn wrong_key_fails_decryption() {
        let sealed = seal(&test_key(5), b"secret", [0x00; NONCE_SIZE]);
        let result = open(&test_key(6), &sealed);

        assert_eq!(result, Err(CryptoError::DecryptionFailed));
    }

    #[test]
    fn flipped_bit_fails_decryption() {
        let key = test_key(7);
        let mut sealed = seal(&key, b"original message", [0x00; NONCE_SIZE]);
        sealed[NONCE_SIZE + 3] ^= 0x01;

        assert_eq!(open(&key, &sealed), Err(CryptoError::DecryptionFailed));
    }

    #[test]
    fn flipped_nonce_bit_fails_decryption() {
        let key = test_key(8);
        let mut sealed = seal(&key, b"original message", [0x00; NONCE_SIZE]);
        sealed[0] ^= 0x80;

        assert_eq!(open(&key, &sealed), Err(CryptoError::DecryptionFailed));
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let key = test_key(9);
        let sealed = seal(&key, b"x", [0x00; NONCE_SIZE]);

        let result = open(&key, &sealed[..SEAL_OVERHEAD - 1]);
        assert_eq!(
            result,
            Err(CryptoError::Truncated { len: SEAL_OVERHEAD - 1, min: SEAL_OVERHEAD })
        );
    }

    #[test]
    fn missing_marker_is_detected() {
        let key = test_key(10);
        let nonce = [0x11; NONCE_SIZE];

        // Authentic ciphertext from a peer that does not prefix the marker
        let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
        let body = cipher
            .encrypt(XNonce::from_slice(&nonce), b"sealframe/kv/v00 old peer".as_slice())
            .unwrap();
        let mut sealed = nonce.to_vec();
        sealed.extend_from_slice(&body);

        assert_eq!(open(&key, &sealed), Err(CryptoError::KnownValueMismatch));
    }
}
