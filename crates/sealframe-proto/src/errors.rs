//! Protocol error types.

use thiserror::Error;

/// Result alias for wire-format operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors from frame and payload encoding/decoding.
///
/// Every variant means the bytes did not come from a well-behaved peer; the
/// frame is discarded without touching vault state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer ended before the header or declared payload
    #[error("frame too short: expected {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Bytes required
        expected: usize,
        /// Bytes available
        actual: usize,
    },

    /// Header does not start with the Sealframe magic
    #[error("invalid magic: {0:#010x}")]
    InvalidMagic(u32),

    /// Header version is not supported by this build
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Opcode byte does not name a known message
    #[error("invalid opcode: {0:#04x}")]
    InvalidOpcode(u8),

    /// Payload exceeds the protocol limit
    #[error("payload too large: {size} bytes exceeds maximum {max}")]
    PayloadTooLarge {
        /// Actual payload size
        size: usize,
        /// Maximum allowed size
        max: usize,
    },

    /// CBOR serialization failed
    #[error("CBOR encode error: {0}")]
    CborEncode(String),

    /// CBOR deserialization failed
    #[error("CBOR decode error: {0}")]
    CborDecode(String),
}
