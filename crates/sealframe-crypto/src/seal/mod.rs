//! Vault sealing: per-vault keys and known-value-prefixed AEAD.
//!
//! ```text
//! seal(key, plaintext, nonce)
//!     = nonce ++ XChaCha20-Poly1305(key, nonce, KNOWN_VALUE_MARKER ++ plaintext)
//! ```
//!
//! [`open`] reverses the layout and refuses to return bytes unless both the
//! authentication tag and the marker check pass.

pub mod cipher;
pub mod error;
pub mod key;

pub use cipher::{KNOWN_VALUE_MARKER, NONCE_SIZE, SEAL_OVERHEAD, open, seal};
pub use error::CryptoError;
pub use key::{KEY_SIZE, SecretKey};
