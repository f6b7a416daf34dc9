//! Outbound broadcast contract.
//!
//! The engine publishes exactly three kinds of messages. Transports implement
//! [`Broadcast`] directly, or implement the lower-level [`FrameSink`] and let
//! [`FramedBroadcast`] handle wire encoding.
//!
//! Delivery is assumed eventual to all live peers, possibly looped back to
//! the sender. The engine suppresses its own messages; the transport does not
//! need to.

use std::sync::Arc;

use sealframe_proto::{
    Frame, LockPayload, NodeId, Payload, ReleasePayload, UnlockPayload, VaultId,
};

use crate::error::BroadcastError;

/// Outbound primitives the engine requires from its transport.
///
/// Implementations must be safe to call from multiple threads. Calls are
/// fire-and-forget: a successful return only means the message was handed to
/// the channel. No retry is performed by the engine.
pub trait Broadcast: Send + Sync {
    /// Publish the sealed bytes of a new vault.
    fn broadcast_lock(&self, vault_id: &VaultId, ciphertext: &[u8]) -> Result<(), BroadcastError>;

    /// Publish the serialized key of a vault.
    fn broadcast_unlock(&self, vault_id: &VaultId, key: &[u8]) -> Result<(), BroadcastError>;

    /// Ask every peer to discard a vault.
    fn broadcast_release(&self, vault_id: &VaultId) -> Result<(), BroadcastError>;
}

impl<B: Broadcast + ?Sized> Broadcast for Arc<B> {
    fn broadcast_lock(&self, vault_id: &VaultId, ciphertext: &[u8]) -> Result<(), BroadcastError> {
        (**self).broadcast_lock(vault_id, ciphertext)
    }

    fn broadcast_unlock(&self, vault_id: &VaultId, key: &[u8]) -> Result<(), BroadcastError> {
        (**self).broadcast_unlock(vault_id, key)
    }

    fn broadcast_release(&self, vault_id: &VaultId) -> Result<(), BroadcastError> {
        (**self).broadcast_release(vault_id)
    }
}

/// A channel that accepts encoded frames for delivery to all peers.
pub trait FrameSink: Send + Sync {
    /// Deliver `frame` to every peer in the group.
    fn send_frame(&self, frame: Frame) -> Result<(), BroadcastError>;
}

/// Adapts a [`FrameSink`] into a [`Broadcast`] by framing each message with
/// the local node as sender.
#[derive(Debug, Clone)]
pub struct FramedBroadcast<S> {
    sender: NodeId,
    sink: S,
}

impl<S: FrameSink> FramedBroadcast<S> {
    /// Frame messages as `sender` and hand them to `sink`.
    pub fn new(sender: NodeId, sink: S) -> Self {
        Self { sender, sink }
    }

    /// Underlying sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn publish(&self, payload: Payload) -> Result<(), BroadcastError> {
        let frame = payload.into_frame(self.sender)?;
        self.sink.send_frame(frame)
    }
}

impl<S: FrameSink> Broadcast for FramedBroadcast<S> {
    fn broadcast_lock(&self, vault_id: &VaultId, ciphertext: &[u8]) -> Result<(), BroadcastError> {
        self.publish(Payload::Lock(LockPayload {
            vault_id: *vault_id,
            ciphertext: ciphertext.to_vec(),
        }))
    }

    fn broadcast_unlock(&self, vault_id: &VaultId, key: &[u8]) -> Result<(), BroadcastError> {
        self.publish(Payload::Unlock(UnlockPayload { vault_id: *vault_id, key: key.to_vec() }))
    }

    fn broadcast_release(&self, vault_id: &VaultId) -> Result<(), BroadcastError> {
        self.publish(Payload::Release(ReleasePayload { vault_id: *vault_id }))
    }
}
