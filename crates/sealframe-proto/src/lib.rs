//! Sealframe wire protocol.
//!
//! Every vault broadcast travels as a [`Frame`]: a fixed 20-byte binary
//! [`FrameHeader`] followed by a CBOR-encoded [`Payload`]. The header carries
//! the sender identity and opcode so the receiving engine can suppress its
//! own loopback traffic before touching the payload.
//!
//! ```text
//! ┌────────┬─────────┬────────┬──────────┬──────────────┬───────────┐
//! │ magic  │ version │ opcode │ reserved │ payload_size │ sender_id │  20 bytes
//! │ 4B     │ 1B      │ 1B     │ 2B       │ 4B (BE)      │ 8B (BE)   │
//! └────────┴─────────┴────────┴──────────┴──────────────┴───────────┘
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ CBOR payload: Lock { vault_id, ciphertext } | Unlock { .. } | .. │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod errors;
mod frame;
mod header;
mod ids;
pub mod payloads;

pub use errors::{ProtocolError, Result};
pub use frame::Frame;
pub use header::{FrameHeader, Opcode};
pub use ids::{NodeId, VaultId};
pub use payloads::{LockPayload, Payload, ReleasePayload, UnlockPayload};
