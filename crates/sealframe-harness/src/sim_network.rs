//! In-memory broadcast network with fault injection.
//!
//! Frames are serialized to wire bytes on send and parsed again on delivery,
//! so every simulated message goes through the real codec. Each node has its
//! own inbox; the sender's own inbox receives a copy (loopback) because real
//! group transports commonly echo.
//!
//! # Faults
//!
//! - Partition: a partitioned node neither sends to nor receives from peers
//! - Reordering: any inbox can be shuffled with a seeded RNG
//! - Tampering: a queued lock can have one ciphertext bit flipped
//! - Closing: every later send fails with `BroadcastError::Closed`

#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::{BTreeMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use rand::{Rng, seq::SliceRandom};
use sealframe_core::{BroadcastError, FrameSink};
use sealframe_proto::{Frame, NodeId, Opcode, Payload, VaultId};

#[derive(Default)]
struct Inbox {
    queue: VecDeque<Vec<u8>>,
    partitioned: bool,
}

#[derive(Default)]
struct NetworkState {
    inboxes: BTreeMap<NodeId, Inbox>,
    closed: bool,
    sent: u64,
    dropped: u64,
}

/// Shared in-memory network. Cloning yields another handle to the same
/// network.
#[derive(Clone, Default)]
pub struct SimNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl SimNetwork {
    /// Create an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, NetworkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach `node` and return its sending endpoint.
    pub fn register(&self, node: NodeId) -> SimEndpoint {
        self.state().inboxes.entry(node).or_default();
        SimEndpoint { node, network: self.clone() }
    }

    /// Registered nodes, sorted.
    pub fn nodes(&self) -> Vec<NodeId> {
        self.state().inboxes.keys().copied().collect()
    }

    /// Isolate `node` from its peers. Frames already queued for it stay.
    pub fn partition(&self, node: NodeId) {
        if let Some(inbox) = self.state().inboxes.get_mut(&node) {
            inbox.partitioned = true;
        }
    }

    /// Reconnect a partitioned node. Frames dropped meanwhile are lost.
    pub fn heal(&self, node: NodeId) {
        if let Some(inbox) = self.state().inboxes.get_mut(&node) {
            inbox.partitioned = false;
        }
    }

    /// Fail every later send.
    pub fn close(&self) {
        self.state().closed = true;
    }

    /// Frames waiting for `node`.
    pub fn pending(&self, node: NodeId) -> usize {
        self.state().inboxes.get(&node).map_or(0, |inbox| inbox.queue.len())
    }

    /// Frames waiting across all nodes.
    pub fn total_pending(&self) -> usize {
        self.state().inboxes.values().map(|inbox| inbox.queue.len()).sum()
    }

    /// Frames accepted for delivery so far, counting each recipient.
    pub fn sent(&self) -> u64 {
        self.state().sent
    }

    /// Frames discarded because of a partition.
    pub fn dropped(&self) -> u64 {
        self.state().dropped
    }

    /// Remove and return all wire frames queued for `node`, oldest first.
    pub fn take(&self, node: NodeId) -> Vec<Vec<u8>> {
        self.state()
            .inboxes
            .get_mut(&node)
            .map(|inbox| inbox.queue.drain(..).collect())
            .unwrap_or_default()
    }

    /// Remove and return the oldest wire frame queued for `node`.
    pub fn pop(&self, node: NodeId) -> Option<Vec<u8>> {
        self.state().inboxes.get_mut(&node).and_then(|inbox| inbox.queue.pop_front())
    }

    /// Append `bytes` to the inbox of `node`, bypassing partitions.
    ///
    /// Paired with [`take`](Self::take) to replay frames in a chosen order.
    /// Returns false if `node` is not registered.
    pub fn requeue(&self, node: NodeId, bytes: Vec<u8>) -> bool {
        match self.state().inboxes.get_mut(&node) {
            Some(inbox) => {
                inbox.queue.push_back(bytes);
                true
            },
            None => false,
        }
    }

    /// Opcodes of the frames queued for `node`, in delivery order.
    pub fn queued_opcodes(&self, node: NodeId) -> Vec<Option<Opcode>> {
        let state = self.state();
        let Some(inbox) = state.inboxes.get(&node) else {
            return Vec::new();
        };
        inbox
            .queue
            .iter()
            .map(|bytes| Frame::decode(bytes).ok().and_then(|f| f.header.opcode_enum()))
            .collect()
    }

    /// Randomly permute the inbox of `node`.
    pub fn shuffle(&self, node: NodeId, rng: &mut impl Rng) {
        if let Some(inbox) = self.state().inboxes.get_mut(&node) {
            inbox.queue.make_contiguous().shuffle(rng);
        }
    }

    /// Flip one bit of the sealed bytes in the queued lock for `vault_id`
    /// addressed to `node`.
    ///
    /// `bit` is taken modulo the ciphertext length in bits. Returns false if
    /// no such lock is queued.
    pub fn tamper_lock(&self, node: NodeId, vault_id: &VaultId, bit: usize) -> bool {
        let mut state = self.state();
        let Some(inbox) = state.inboxes.get_mut(&node) else {
            return false;
        };

        for bytes in &mut inbox.queue {
            let Ok(frame) = Frame::decode(bytes) else {
                continue;
            };
            let sender = frame.header.sender_id();
            let Ok(Payload::Lock(mut lock)) = Payload::from_frame(&frame) else {
                continue;
            };
            if lock.vault_id != *vault_id || lock.ciphertext.is_empty() {
                continue;
            }

            let bit = bit % (lock.ciphertext.len() * 8);
            lock.ciphertext[bit / 8] ^= 1u8 << (bit % 8);

            let Ok(rewritten) = Payload::Lock(lock).into_frame(sender).and_then(|f| f.to_vec())
            else {
                return false;
            };
            *bytes = rewritten;
            tracing::debug!(node = %node, vault_id = %vault_id, bit, "Tampered queued lock");
            return true;
        }
        false
    }

    fn publish(&self, from: NodeId, bytes: &[u8]) -> Result<(), BroadcastError> {
        let mut state = self.state();
        if state.closed {
            return Err(BroadcastError::Closed);
        }

        let sender_partitioned = state.inboxes.get(&from).is_some_and(|inbox| inbox.partitioned);
        let mut sent = 0;
        let mut dropped = 0;
        for (node, inbox) in &mut state.inboxes {
            let loopback = *node == from;
            if !loopback && (sender_partitioned || inbox.partitioned) {
                dropped += 1;
                continue;
            }
            inbox.queue.push_back(bytes.to_vec());
            sent += 1;
        }
        state.sent += sent;
        state.dropped += dropped;
        Ok(())
    }
}

/// Sending side of one node's network attachment.
#[derive(Clone)]
pub struct SimEndpoint {
    node: NodeId,
    network: SimNetwork,
}

impl SimEndpoint {
    /// Node this endpoint sends as.
    pub fn node(&self) -> NodeId {
        self.node
    }
}

impl FrameSink for SimEndpoint {
    fn send_frame(&self, frame: Frame) -> Result<(), BroadcastError> {
        let bytes = frame.to_vec()?;
        self.network.publish(self.node, &bytes)
    }
}
