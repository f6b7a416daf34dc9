//! Node and vault identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a node in the peer group.
///
/// Agreed out-of-band; the transport stamps it into every frame header.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Globally unique identifier of one locked value.
///
/// # Invariants
///
/// - Immutable once created
/// - Equality, ordering and hashing cover both `origin` and `seq`
/// - `seq` is unique per origin for the lifetime of the peer group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VaultId {
    origin: NodeId,
    seq: u64,
}

impl VaultId {
    /// Create a vault identifier.
    pub const fn new(origin: NodeId, seq: u64) -> Self {
        Self { origin, seq }
    }

    /// Node that created (and alone may unlock) the vault.
    pub const fn origin(&self) -> NodeId {
        self.origin
    }

    /// Intra-node discriminator.
    pub const fn seq(&self) -> u64 {
        self.seq
    }
}

impl fmt::Display for VaultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.origin, self.seq)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn vault_id_display() {
        let id = VaultId::new(NodeId(42), 7);
        insta::assert_snapshot!(id.to_string(), @"000000000000002a:7");
    }

    #[test]
    fn equality_covers_both_fields() {
        let a = VaultId::new(NodeId(1), 1);

        assert_eq!(a, VaultId::new(NodeId(1), 1));
        assert_ne!(a, VaultId::new(NodeId(2), 1));
        assert_ne!(a, VaultId::new(NodeId(1), 2));

        let set: HashSet<_> =
            [a, VaultId::new(NodeId(2), 1), VaultId::new(NodeId(1), 2), a].into_iter().collect();
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn vault_id_cbor_round_trip() {
        let original = VaultId::new(NodeId(u64::MAX), 12_345);

        let mut encoded = Vec::new();
        ciborium::ser::into_writer(&original, &mut encoded).unwrap();
        let decoded: VaultId = ciborium::de::from_reader(&encoded[..]).unwrap();

        assert_eq!(original, decoded);
    }
}
