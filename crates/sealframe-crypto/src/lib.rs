//! Sealframe Cryptographic Primitives
//!
//! Cipher adapter for commit-then-reveal vaults. Pure functions with
//! deterministic outputs. Callers provide random bytes (key material and
//! nonces) so that simulation runs stay reproducible.
//!
//! # Key Lifecycle
//!
//! Every locked value gets its own freshly generated [`SecretKey`]. The key
//! lives only in the creator's engine until the vault is unlocked, at which
//! point its serialized bytes are broadcast and the local copy is dropped
//! (and zeroized).
//!
//! ```text
//! random bytes ──► SecretKey ──┐
//!                              ▼
//! KNOWN_VALUE_MARKER ++ plaintext ──► XChaCha20-Poly1305 ──► nonce ++ ciphertext
//! ```
//!
//! # Security
//!
//! Confidentiality:
//! - Sealed bytes are unreadable until the key is revealed
//! - A random 24-byte nonce per seal avoids pattern leakage across vaults
//!
//! Tamper Detection:
//! - Poly1305 tag rejects any flipped bit in nonce or ciphertext
//! - The known-value marker rejects payloads that authenticate under the key
//!   but were not produced by a compatible peer
//!
//! Non-goals:
//! - No forward secrecy or deniability; a revealed key opens its vault forever

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod seal;

pub use seal::{
    CryptoError, KEY_SIZE, KNOWN_VALUE_MARKER, NONCE_SIZE, SEAL_OVERHEAD, SecretKey, open, seal,
};
