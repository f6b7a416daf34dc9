//! Observable state snapshots for invariant checking.
//!
//! Invariants run on snapshots rather than live engines so that every check
//! sees one consistent view.

use std::collections::BTreeSet;

use sealframe_core::{NodeId, VaultId, VaultState};

/// Snapshot of every node in a cluster.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Per-node snapshots.
    pub nodes: Vec<NodeSnapshot>,
}

impl SystemSnapshot {
    /// Create an empty snapshot (no nodes).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a snapshot from per-node snapshots.
    pub fn from_nodes(nodes: Vec<NodeSnapshot>) -> Self {
        Self { nodes }
    }

    /// Snapshot of `id`, if present.
    pub fn node(&self, id: NodeId) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|node| node.id == id)
    }
}

/// Observable state of one node.
#[derive(Debug, Clone, Default)]
pub struct NodeSnapshot {
    /// Node identity.
    pub id: NodeId,
    /// Store entries as returned by `VaultEngine::snapshot`.
    pub entries: Vec<(VaultId, VaultState)>,
    /// Vaults created here whose key is still private.
    pub private_keys: BTreeSet<VaultId>,
    /// Vaults this node has ever observed as compromised and not released
    /// since.
    pub compromised_history: BTreeSet<VaultId>,
}

impl NodeSnapshot {
    /// Create an empty node snapshot.
    pub fn new(id: NodeId) -> Self {
        Self { id, ..Default::default() }
    }

    /// Add a store entry.
    #[must_use]
    pub fn with_entry(mut self, vault_id: VaultId, state: VaultState) -> Self {
        self.entries.push((vault_id, state));
        self
    }

    /// Mark a key as still private.
    #[must_use]
    pub fn with_private_key(mut self, vault_id: VaultId) -> Self {
        self.private_keys.insert(vault_id);
        self
    }

    /// Record an earlier compromised observation.
    #[must_use]
    pub fn with_compromised_history(mut self, vault_id: VaultId) -> Self {
        self.compromised_history.insert(vault_id);
        self
    }

    /// Plaintext for `vault_id`, if unlocked here.
    pub fn plaintext(&self, vault_id: &VaultId) -> Option<&[u8]> {
        self.entries.iter().find_map(|(id, state)| match state {
            VaultState::Unlocked(plaintext) if id == vault_id => Some(plaintext.as_slice()),
            _ => None,
        })
    }
}
