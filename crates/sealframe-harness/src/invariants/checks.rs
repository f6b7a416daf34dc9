//! Standard vault invariant checks.

use std::collections::{BTreeMap, BTreeSet};

use sealframe_core::{NodeId, VaultId, VaultState};

use super::{Invariant, InvariantResult, SystemSnapshot};

/// An id lives in at most one of a node's two maps.
pub struct SingleHome;

impl Invariant for SingleHome {
    fn name(&self) -> &'static str {
        "SingleHome"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for node in &state.nodes {
            let mut seen = BTreeSet::new();
            for (vault_id, _) in &node.entries {
                if !seen.insert(*vault_id) {
                    return Err(self.violation(format!(
                        "node {}: vault {vault_id} is both sealed and unlocked",
                        node.id
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Every unlocked copy of a vault holds the same bytes.
///
/// Divergent plaintexts would mean a peer accepted data the creator never
/// sealed.
pub struct PlaintextAgreement;

impl Invariant for PlaintextAgreement {
    fn name(&self) -> &'static str {
        "PlaintextAgreement"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let mut first_seen: BTreeMap<VaultId, (NodeId, &[u8])> = BTreeMap::new();

        for node in &state.nodes {
            for (vault_id, entry) in &node.entries {
                let VaultState::Unlocked(plaintext) = entry else {
                    continue;
                };
                match first_seen.get(vault_id) {
                    Some((other, expected)) if *expected != plaintext.as_slice() => {
                        return Err(self.violation(format!(
                            "vault {vault_id}: node {} and node {other} disagree on plaintext",
                            node.id
                        )));
                    },
                    Some(_) => {},
                    None => {
                        first_seen.insert(*vault_id, (node.id, plaintext.as_slice()));
                    },
                }
            }
        }
        Ok(())
    }
}

/// A peer holds plaintext only once the creator has given up the key.
///
/// Only checkable while the creator is part of the snapshot.
pub struct NoPrematureReveal;

impl Invariant for NoPrematureReveal {
    fn name(&self) -> &'static str {
        "NoPrematureReveal"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for node in &state.nodes {
            for (vault_id, entry) in &node.entries {
                if vault_id.origin() == node.id || !matches!(entry, VaultState::Unlocked(_)) {
                    continue;
                }
                let Some(origin) = state.node(vault_id.origin()) else {
                    continue;
                };
                if origin.private_keys.contains(vault_id) {
                    return Err(self.violation(format!(
                        "node {}: vault {vault_id} unlocked while origin still holds its key",
                        node.id
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A vault seen as compromised never becomes readable on that node.
pub struct CompromisedNeverUnlocked;

impl Invariant for CompromisedNeverUnlocked {
    fn name(&self) -> &'static str {
        "CompromisedNeverUnlocked"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for node in &state.nodes {
            for (vault_id, entry) in &node.entries {
                if matches!(entry, VaultState::Unlocked(_))
                    && node.compromised_history.contains(vault_id)
                {
                    return Err(self.violation(format!(
                        "node {}: compromised vault {vault_id} was unlocked",
                        node.id
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invariants::NodeSnapshot;

    fn vault() -> VaultId {
        VaultId::new(NodeId(1), 0)
    }

    fn unlocked(bytes: &[u8]) -> VaultState {
        VaultState::Unlocked(bytes.to_vec())
    }

    #[test]
    fn single_home_detects_double_entry() {
        let state = SystemSnapshot::from_nodes(vec![
            NodeSnapshot::new(NodeId(2))
                .with_entry(vault(), VaultState::Sealed)
                .with_entry(vault(), unlocked(b"x")),
        ]);
        let violation = SingleHome.check(&state).unwrap_err();
        assert_eq!(violation.invariant, "SingleHome");
    }

    #[test]
    fn plaintext_agreement_detects_divergence() {
        let agree = SystemSnapshot::from_nodes(vec![
            NodeSnapshot::new(NodeId(1)).with_entry(vault(), unlocked(b"a")),
            NodeSnapshot::new(NodeId(2)).with_entry(vault(), unlocked(b"a")),
        ]);
        assert!(PlaintextAgreement.check(&agree).is_ok());

        let diverge = SystemSnapshot::from_nodes(vec![
            NodeSnapshot::new(NodeId(1)).with_entry(vault(), unlocked(b"a")),
            NodeSnapshot::new(NodeId(2)).with_entry(vault(), unlocked(b"b")),
        ]);
        assert!(PlaintextAgreement.check(&diverge).is_err());
    }

    #[test]
    fn premature_reveal_is_detected() {
        let state = SystemSnapshot::from_nodes(vec![
            NodeSnapshot::new(NodeId(1))
                .with_entry(vault(), unlocked(b"a"))
                .with_private_key(vault()),
            NodeSnapshot::new(NodeId(2)).with_entry(vault(), unlocked(b"a")),
        ]);
        let violation = NoPrematureReveal.check(&state).unwrap_err();
        insta::assert_snapshot!(
            violation.to_string(),
            @"NoPrematureReveal: node 0000000000000002: vault 0000000000000001:0 unlocked while origin still holds its key"
        );
    }

    #[test]
    fn creator_may_read_before_reveal() {
        let state = SystemSnapshot::from_nodes(vec![
            NodeSnapshot::new(NodeId(1))
                .with_entry(vault(), unlocked(b"a"))
                .with_private_key(vault()),
            NodeSnapshot::new(NodeId(2)).with_entry(vault(), VaultState::Sealed),
        ]);
        assert!(NoPrematureReveal.check(&state).is_ok());
    }

    #[test]
    fn compromised_vault_must_stay_locked() {
        let state = SystemSnapshot::from_nodes(vec![
            NodeSnapshot::new(NodeId(2))
                .with_entry(vault(), unlocked(b"a"))
                .with_compromised_history(vault()),
        ]);
        assert!(CompromisedNeverUnlocked.check(&state).is_err());
    }
}
