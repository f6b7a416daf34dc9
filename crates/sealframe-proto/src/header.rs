//! Frame header implementation with zero-copy parsing.
//!
//! The `FrameHeader` is a fixed 20-byte structure serialized as raw binary
//! (Big Endian). Receivers read the opcode and sender without decoding the
//! CBOR payload.

use std::fmt;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{
    NodeId,
    errors::{ProtocolError, Result},
};

/// Vault message type carried in the header.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Creator announces sealed bytes for a new vault
    Lock = 0x01,
    /// Creator reveals the vault key
    Unlock = 0x02,
    /// Any node discards a vault everywhere
    Release = 0x03,
}

impl Opcode {
    /// Raw opcode byte.
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Parse an opcode byte. `None` if unrecognized.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Lock),
            0x02 => Some(Self::Unlock),
            0x03 => Some(Self::Release),
            _ => None,
        }
    }
}

/// Fixed 20-byte frame header (Big Endian network byte order)
///
/// Fields are stored as raw byte arrays so every 20-byte pattern is a valid
/// value; semantic checks happen in [`FrameHeader::from_bytes`].
///
/// # Security
///
/// `sender_id` is stamped by the sending endpoint. The header is not
/// authenticated here; the broadcast channel is assumed to attribute frames
/// to the correct peer.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct FrameHeader {
    magic: [u8; 4],                     // 0x53564C54 ("SVLT" in ASCII)
    version: u8,                        // 0x01
    opcode: u8,                         // Opcode
    reserved: [u8; 2],                  // zero
    pub(crate) payload_size: [u8; 4],   // u32 payload length
    sender_id: [u8; 8],                 // u64 sending node
}

impl FrameHeader {
    /// Size of the serialized header (20 bytes)
    pub const SIZE: usize = 20;

    /// Magic number: "SVLT" in ASCII (0x53564C54)
    pub const MAGIC: u32 = 0x5356_4C54;

    /// Current protocol version
    pub const VERSION: u8 = 0x01;

    /// Maximum payload size (16 MB)
    pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

    /// Create a header for a frame sent by `sender`.
    #[must_use]
    pub fn new(opcode: Opcode, sender: NodeId) -> Self {
        Self {
            magic: Self::MAGIC.to_be_bytes(),
            version: Self::VERSION,
            opcode: opcode.to_u8(),
            reserved: [0; 2],
            payload_size: [0; 4],
            sender_id: sender.0.to_be_bytes(),
        }
    }

    /// Parse header from network bytes.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooShort` if buffer is shorter than 20 bytes
    /// - `ProtocolError::InvalidMagic` if magic number is invalid
    /// - `ProtocolError::UnsupportedVersion` if protocol version is unsupported
    /// - `ProtocolError::InvalidOpcode` if the opcode byte is unknown
    /// - `ProtocolError::PayloadTooLarge` if payload size exceeds maximum
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (header, _) = Self::read_from_prefix(bytes).map_err(|_| {
            ProtocolError::FrameTooShort { expected: Self::SIZE, actual: bytes.len() }
        })?;

        let magic = u32::from_be_bytes(header.magic);
        if magic != Self::MAGIC {
            return Err(ProtocolError::InvalidMagic(magic));
        }

        if header.version != Self::VERSION {
            return Err(ProtocolError::UnsupportedVersion(header.version));
        }

        if Opcode::from_u8(header.opcode).is_none() {
            return Err(ProtocolError::InvalidOpcode(header.opcode));
        }

        let payload_size = u32::from_be_bytes(header.payload_size);
        if payload_size > Self::MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_size as usize,
                max: Self::MAX_PAYLOAD_SIZE as usize,
            });
        }

        Ok(header)
    }

    /// Serialize header to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(IntoBytes::as_bytes(self));
        arr
    }

    /// Protocol version byte (currently 0x01).
    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Operation code as raw byte.
    #[must_use]
    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    /// Operation code as enum. `None` if unrecognized.
    #[must_use]
    pub fn opcode_enum(&self) -> Option<Opcode> {
        Opcode::from_u8(self.opcode)
    }

    /// Node that sent the frame.
    #[must_use]
    pub fn sender_id(&self) -> NodeId {
        NodeId(u64::from_be_bytes(self.sender_id))
    }

    /// Declared payload length in bytes.
    #[must_use]
    pub fn payload_size(&self) -> u32 {
        u32::from_be_bytes(self.payload_size)
    }
}

impl fmt::Debug for FrameHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameHeader")
            .field("version", &self.version)
            .field("opcode", &self.opcode_enum())
            .field("payload_size", &self.payload_size())
            .field("sender_id", &self.sender_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_size_is_twenty_bytes() {
        assert_eq!(std::mem::size_of::<FrameHeader>(), FrameHeader::SIZE);
    }

    #[test]
    fn new_header_round_trips() {
        let header = FrameHeader::new(Opcode::Unlock, NodeId(0x0102_0304_0506_0708));
        let bytes = header.to_bytes();

        assert_eq!(&bytes[0..4], b"SVLT");
        assert_eq!(bytes[4], FrameHeader::VERSION);
        assert_eq!(bytes[5], 0x02);
        assert_eq!(&bytes[12..20], &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);

        let parsed = FrameHeader::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.opcode_enum(), Some(Opcode::Unlock));
        assert_eq!(parsed.sender_id(), NodeId(0x0102_0304_0506_0708));
    }

    #[test]
    fn short_buffer_is_rejected() {
        let result = FrameHeader::from_bytes(&[0u8; 10]);
        assert_eq!(result, Err(ProtocolError::FrameTooShort { expected: 20, actual: 10 }));
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = FrameHeader::new(Opcode::Lock, NodeId(1)).to_bytes();
        bytes[0] = b'X';

        assert!(matches!(FrameHeader::from_bytes(&bytes), Err(ProtocolError::InvalidMagic(_))));
    }

    #[test]
    fn future_version_is_rejected() {
        let mut bytes = FrameHeader::new(Opcode::Lock, NodeId(1)).to_bytes();
        bytes[4] = 0x02;

        assert_eq!(FrameHeader::from_bytes(&bytes), Err(ProtocolError::UnsupportedVersion(2)));
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        let mut bytes = FrameHeader::new(Opcode::Lock, NodeId(1)).to_bytes();
        bytes[5] = 0x7F;

        assert_eq!(FrameHeader::from_bytes(&bytes), Err(ProtocolError::InvalidOpcode(0x7F)));
    }

    #[test]
    fn oversized_payload_claim_is_rejected() {
        let mut bytes = FrameHeader::new(Opcode::Lock, NodeId(1)).to_bytes();
        bytes[8..12].copy_from_slice(&(FrameHeader::MAX_PAYLOAD_SIZE + 1).to_be_bytes());

        assert!(matches!(
            FrameHeader::from_bytes(&bytes),
            Err(ProtocolError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn opcode_byte_mapping() {
        for opcode in [Opcode::Lock, Opcode::Unlock, Opcode::Release] {
            assert_eq!(Opcode::from_u8(opcode.to_u8()), Some(opcode));
        }
        assert_eq!(Opcode::from_u8(0x00), None);
    }
}
