//! Property-based tests for vault sealing
//!
//! These tests verify the invariants the protocol engine relies on:
//!
//! 1. **Round-trip**: open(seal(m)) == m under the same key
//! 2. **Tamper detection**: any single flipped bit is rejected
//! 3. **Key isolation**: a different key never opens the vault
//! 4. **Key transport**: serialized keys open what the original sealed

use proptest::prelude::*;
use sealframe_crypto::{CryptoError, KEY_SIZE, NONCE_SIZE, SecretKey, open, seal};

fn arbitrary_key_bytes() -> impl Strategy<Value = [u8; KEY_SIZE]> {
    prop::array::uniform32(any::<u8>())
}

fn arbitrary_nonce() -> impl Strategy<Value = [u8; NONCE_SIZE]> {
    prop::collection::vec(any::<u8>(), NONCE_SIZE..=NONCE_SIZE).prop_map(|v| {
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&v);
        nonce
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_seal_open_roundtrip(
        plaintext in prop::collection::vec(any::<u8>(), 0..1000),
        key_bytes in arbitrary_key_bytes(),
        nonce in arbitrary_nonce(),
    ) {
        let key = SecretKey::from_random(key_bytes);
        let sealed = seal(&key, &plaintext, nonce);

        prop_assert_eq!(open(&key, &sealed).unwrap(), plaintext);
    }

    #[test]
    fn prop_single_bit_flip_never_opens(
        plaintext in prop::collection::vec(any::<u8>(), 1..256),
        key_bytes in arbitrary_key_bytes(),
        nonce in arbitrary_nonce(),
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let key = SecretKey::from_random(key_bytes);
        let mut sealed = seal(&key, &plaintext, nonce);

        let index = position.index(sealed.len());
        sealed[index] ^= 1 << bit;

        let result = open(&key, &sealed);
        prop_assert!(result.is_err());
        prop_assert!(result.unwrap_err().is_tamper_signal());
    }

    #[test]
    fn prop_wrong_key_never_opens(
        plaintext in prop::collection::vec(any::<u8>(), 0..256),
        key_a in arbitrary_key_bytes(),
        key_b in arbitrary_key_bytes(),
        nonce in arbitrary_nonce(),
    ) {
        prop_assume!(key_a != key_b);

        let sealed = seal(&SecretKey::from_random(key_a), &plaintext, nonce);
        let result = open(&SecretKey::from_random(key_b), &sealed);

        prop_assert_eq!(result, Err(CryptoError::DecryptionFailed));
    }

    #[test]
    fn prop_transported_key_opens_vault(
        plaintext in prop::collection::vec(any::<u8>(), 0..256),
        key_bytes in arbitrary_key_bytes(),
        nonce in arbitrary_nonce(),
    ) {
        let creator_key = SecretKey::from_random(key_bytes);
        let sealed = seal(&creator_key, &plaintext, nonce);

        let wire = creator_key.to_bytes();
        drop(creator_key);

        let peer_key = SecretKey::from_bytes(&wire).unwrap();
        prop_assert_eq!(open(&peer_key, &sealed).unwrap(), plaintext);
    }
}
