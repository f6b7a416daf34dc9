//! Engine configuration.

use sealframe_crypto::SEAL_OVERHEAD;
use sealframe_proto::FrameHeader;

use crate::error::VaultError;

/// What to do with an unlock whose lock has not been received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EarlyUnlockPolicy {
    /// Report `VaultError::UnlockBeforeLock` and drop the key
    #[default]
    Reject,
    /// Park the key until the matching lock arrives
    Buffer,
}

/// Vault engine configuration
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Largest plaintext accepted by `lock`
    pub max_plaintext_len: usize,
    /// Handling of unlocks that overtake their lock
    pub early_unlock: EarlyUnlockPolicy,
    /// Cap on parked keys under [`EarlyUnlockPolicy::Buffer`]
    pub max_pending_unlocks: usize,
    /// Cap on remembered released ids. Past it the oldest id is forgotten and
    /// a late lock or unlock for it is accepted again.
    pub max_released_ids: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            max_plaintext_len: 1024 * 1024,
            early_unlock: EarlyUnlockPolicy::Reject,
            max_pending_unlocks: 1024,
            max_released_ids: 64 * 1024,
        }
    }
}

impl VaultConfig {
    /// Upper bound on plaintext so a sealed lock still fits in one frame.
    ///
    /// CBOR encodes each ciphertext byte in up to two bytes, plus a small
    /// envelope for the vault id.
    pub const PLAINTEXT_LIMIT: usize =
        (FrameHeader::MAX_PAYLOAD_SIZE as usize - 64) / 2 - SEAL_OVERHEAD;

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.max_plaintext_len == 0 {
            return Err(VaultError::InvalidArgument("max_plaintext_len must be positive".into()));
        }
        if self.max_plaintext_len > Self::PLAINTEXT_LIMIT {
            return Err(VaultError::InvalidArgument(format!(
                "max_plaintext_len {} exceeds frame limit {}",
                self.max_plaintext_len,
                Self::PLAINTEXT_LIMIT
            )));
        }
        if self.early_unlock == EarlyUnlockPolicy::Buffer && self.max_pending_unlocks == 0 {
            return Err(VaultError::InvalidArgument(
                "max_pending_unlocks must be positive when buffering".into(),
            ));
        }
        if self.max_released_ids == 0 {
            return Err(VaultError::InvalidArgument("max_released_ids must be positive".into()));
        }
        Ok(())
    }
}
