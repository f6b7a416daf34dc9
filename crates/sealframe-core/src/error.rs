//! Error types for the vault protocol.
//!
//! Every operation on an unknown, still-locked or compromised vault returns a
//! typed error so that callers can poll or back off without relying on
//! panics.

use sealframe_crypto::CryptoError;
use sealframe_proto::{NodeId, ProtocolError, VaultId};
use thiserror::Error;

/// Errors raised by the outbound broadcast collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BroadcastError {
    /// Channel to the peer group is gone
    #[error("broadcast channel closed")]
    Closed,

    /// Message could not be framed
    #[error("frame encoding failed: {0}")]
    Encode(#[from] ProtocolError),

    /// Transport-specific failure
    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors from vault store and engine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    /// Vault id was announced or promoted twice (replay, buggy peer or id
    /// collision)
    #[error("duplicate vault: {vault_id}")]
    DuplicateVault {
        /// Vault that already exists
        vault_id: VaultId,
    },

    /// Only the creator may unlock a vault
    #[error("node {caller} does not own vault {vault_id}")]
    NotOwner {
        /// Vault the caller tried to unlock
        vault_id: VaultId,
        /// Node that attempted the call
        caller: NodeId,
    },

    /// Vault is in neither store
    #[error("unknown vault: {vault_id}")]
    UnknownVault {
        /// Requested vault
        vault_id: VaultId,
    },

    /// Only sealed bytes are held for this vault
    #[error("vault {vault_id} is not unlocked")]
    NotUnlocked {
        /// Requested vault
        vault_id: VaultId,
    },

    /// Creator already published the key
    #[error("vault {vault_id} is already unlocked")]
    AlreadyUnlocked {
        /// Requested vault
        vault_id: VaultId,
    },

    /// Revealed key did not open the sealed bytes; the vault is never promoted
    #[error("integrity violation for vault {vault_id}: {cause}")]
    IntegrityViolation {
        /// Affected vault
        vault_id: VaultId,
        /// Why opening failed
        #[source]
        cause: CryptoError,
    },

    /// Caller passed an unusable argument (empty data, zero timeout, ...)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Unlock arrived with no matching lock under the reject policy
    #[error("unlock for vault {vault_id} arrived before its lock")]
    UnlockBeforeLock {
        /// Vault named by the unlock
        vault_id: VaultId,
    },

    /// Lock or unlock for a vault this node already released
    #[error("vault {vault_id} was released")]
    Released {
        /// Vault named by the late message
        vault_id: VaultId,
    },

    /// Lock or unlock sent by a node other than the vault's origin
    #[error("vault {vault_id} announced by {sender}, not by its origin")]
    OriginMismatch {
        /// Vault named in the message
        vault_id: VaultId,
        /// Node that actually sent it
        sender: NodeId,
    },

    /// Early-unlock buffer is at capacity
    #[error("pending unlock buffer full ({capacity} entries)")]
    PendingUnlocksFull {
        /// Configured capacity
        capacity: usize,
    },

    /// Inbound frame could not be decoded
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Outbound broadcast failed
    #[error("broadcast failed: {0}")]
    Broadcast(#[from] BroadcastError),
}

impl VaultError {
    /// Returns true if this error is a security-relevant event.
    ///
    /// Security events indicate tampering, forgery or replay by a peer and
    /// must be surfaced to monitoring rather than retried.
    pub fn is_security_event(&self) -> bool {
        matches!(
            self,
            Self::IntegrityViolation { .. }
                | Self::OriginMismatch { .. }
                | Self::DuplicateVault { .. }
        )
    }

    /// Returns true if the condition may resolve by waiting.
    ///
    /// A vault that is unknown or still sealed may become readable once the
    /// corresponding broadcast is delivered.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::UnknownVault { .. } | Self::NotUnlocked { .. })
    }
}
