//! CBOR-encoded vault messages.
//!
//! The opcode in the frame header identifies the payload type, so only the
//! inner struct is serialized (no variant tag in CBOR).
//!
//! # Invariants
//!
//! Each payload variant maps to exactly one opcode (enforced by match
//! exhaustiveness). Round-trip encoding must produce identical values.

use serde::{Deserialize, Serialize};

use crate::{
    Frame, FrameHeader, NodeId, Opcode, VaultId,
    errors::{ProtocolError, Result},
};

/// Creator announces the sealed bytes of a new vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockPayload {
    /// Vault being announced
    pub vault_id: VaultId,
    /// `nonce ++ AEAD(marker ++ plaintext)`
    pub ciphertext: Vec<u8>,
}

/// Creator reveals the key of a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockPayload {
    /// Vault being unlocked
    pub vault_id: VaultId,
    /// Serialized vault key
    pub key: Vec<u8>,
}

/// Any node asks every peer to forget a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleasePayload {
    /// Vault being released
    pub vault_id: VaultId,
}

/// All vault protocol messages.
///
/// # Security
///
/// - No Variant Tag: the frame header's opcode already identifies the payload
///   type, so a peer cannot send a mismatched opcode/payload pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Sealed announcement
    Lock(LockPayload),
    /// Key reveal
    Unlock(UnlockPayload),
    /// Release notice
    Release(ReleasePayload),
}

impl Payload {
    /// Opcode corresponding to this payload type.
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        match self {
            Self::Lock(_) => Opcode::Lock,
            Self::Unlock(_) => Opcode::Unlock,
            Self::Release(_) => Opcode::Release,
        }
    }

    /// Vault this message refers to.
    #[must_use]
    pub const fn vault_id(&self) -> VaultId {
        match self {
            Self::Lock(p) => p.vault_id,
            Self::Unlock(p) => p.vault_id,
            Self::Release(p) => p.vault_id,
        }
    }

    /// Encode the payload body to CBOR.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let written = match self {
            Self::Lock(p) => ciborium::ser::into_writer(p, &mut buf),
            Self::Unlock(p) => ciborium::ser::into_writer(p, &mut buf),
            Self::Release(p) => ciborium::ser::into_writer(p, &mut buf),
        };
        written.map_err(|e| ProtocolError::CborEncode(e.to_string()))?;
        Ok(buf)
    }

    /// Decode a CBOR payload body for the given opcode.
    pub fn decode(opcode: Opcode, bytes: &[u8]) -> Result<Self> {
        fn cbor<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T> {
            ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::CborDecode(e.to_string()))
        }

        Ok(match opcode {
            Opcode::Lock => Self::Lock(cbor(bytes)?),
            Opcode::Unlock => Self::Unlock(cbor(bytes)?),
            Opcode::Release => Self::Release(cbor(bytes)?),
        })
    }

    /// Wrap the payload in a frame sent by `sender`.
    pub fn into_frame(self, sender: NodeId) -> Result<Frame> {
        let body = self.encode()?;
        let frame = Frame::new(FrameHeader::new(self.opcode(), sender), body);

        if frame.payload.len() > FrameHeader::MAX_PAYLOAD_SIZE as usize {
            return Err(ProtocolError::PayloadTooLarge {
                size: frame.payload.len(),
                max: FrameHeader::MAX_PAYLOAD_SIZE as usize,
            });
        }

        Ok(frame)
    }

    /// Decode the typed payload carried by a frame.
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let opcode = frame
            .header
            .opcode_enum()
            .ok_or(ProtocolError::InvalidOpcode(frame.header.opcode()))?;
        Self::decode(opcode, &frame.payload)
    }
}
