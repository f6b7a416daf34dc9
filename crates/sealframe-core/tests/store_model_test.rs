//! Model-based property tests for the vault store.
//!
//! Random operation sequences are applied to both the real `VaultStore` and a
//! plain map model; every result and the final contents must agree.
//!
//! ```text
//! proptest generates: Vec<StoreOp>
//!                          │
//!           ┌──────────────┼──────────────┐
//!           ▼              ▼              ▼
//!       ModelStore     VaultStore      Compare
//!       (reference)    (real)          results
//! ```

use std::collections::BTreeMap;

use proptest::prelude::*;
use sealframe_core::{NodeId, VaultError, VaultId, VaultState, VaultStore};
use sealframe_crypto::CryptoError;

#[derive(Debug, Clone)]
enum StoreOp {
    PutUnverified { seq: u64, ciphertext: Vec<u8> },
    Promote { seq: u64, plaintext: Vec<u8> },
    PutLocal { seq: u64, plaintext: Vec<u8> },
    Compromise { seq: u64 },
    Release { seq: u64 },
    Get { seq: u64 },
}

fn vault(seq: u64) -> VaultId {
    VaultId::new(NodeId(1), seq)
}

fn small_bytes() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..16)
}

fn store_op() -> impl Strategy<Value = StoreOp> {
    let seq = 0u64..4;
    prop_oneof![
        (seq.clone(), small_bytes())
            .prop_map(|(seq, ciphertext)| StoreOp::PutUnverified { seq, ciphertext }),
        (seq.clone(), small_bytes())
            .prop_map(|(seq, plaintext)| StoreOp::Promote { seq, plaintext }),
        (seq.clone(), small_bytes())
            .prop_map(|(seq, plaintext)| StoreOp::PutLocal { seq, plaintext }),
        seq.clone().prop_map(|seq| StoreOp::Compromise { seq }),
        seq.clone().prop_map(|seq| StoreOp::Release { seq }),
        seq.prop_map(|seq| StoreOp::Get { seq }),
    ]
}

/// Reference model: one state per id, which makes the single-home invariant
/// structural.
#[derive(Default)]
struct ModelStore {
    entries: BTreeMap<VaultId, VaultState>,
}

#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Ok,
    Flag(bool),
    Value(Vec<u8>),
    Err(VaultError),
}

impl From<Result<(), VaultError>> for Outcome {
    fn from(result: Result<(), VaultError>) -> Self {
        match result {
            Ok(()) => Self::Ok,
            Err(e) => Self::Err(e),
        }
    }
}

impl ModelStore {
    fn apply(&mut self, op: &StoreOp) -> Outcome {
        match op {
            StoreOp::PutUnverified { seq, .. } => {
                let id = vault(*seq);
                if self.entries.contains_key(&id) {
                    return Outcome::Err(VaultError::DuplicateVault { vault_id: id });
                }
                self.entries.insert(id, VaultState::Sealed);
                Outcome::Ok
            },
            StoreOp::Promote { seq, plaintext } => {
                let id = vault(*seq);
                match self.entries.get(&id) {
                    Some(VaultState::Unlocked(_)) => {
                        Outcome::Err(VaultError::DuplicateVault { vault_id: id })
                    },
                    Some(VaultState::Compromised) => Outcome::Err(VaultError::IntegrityViolation {
                        vault_id: id,
                        cause: CryptoError::KnownValueMismatch,
                    }),
                    _ => {
                        self.entries.insert(id, VaultState::Unlocked(plaintext.clone()));
                        Outcome::Ok
                    },
                }
            },
            StoreOp::PutLocal { seq, plaintext } => {
                let id = vault(*seq);
                if self.entries.contains_key(&id) {
                    return Outcome::Err(VaultError::DuplicateVault { vault_id: id });
                }
                self.entries.insert(id, VaultState::Unlocked(plaintext.clone()));
                Outcome::Ok
            },
            StoreOp::Compromise { seq } => match self.entries.get_mut(&vault(*seq)) {
                Some(state @ (VaultState::Sealed | VaultState::Compromised)) => {
                    *state = VaultState::Compromised;
                    Outcome::Flag(true)
                },
                _ => Outcome::Flag(false),
            },
            StoreOp::Release { seq } => Outcome::Flag(self.entries.remove(&vault(*seq)).is_some()),
            StoreOp::Get { seq } => {
                let id = vault(*seq);
                match self.entries.get(&id) {
                    Some(VaultState::Unlocked(plaintext)) => Outcome::Value(plaintext.clone()),
                    Some(VaultState::Sealed) => {
                        Outcome::Err(VaultError::NotUnlocked { vault_id: id })
                    },
                    Some(VaultState::Compromised) => Outcome::Err(VaultError::IntegrityViolation {
                        vault_id: id,
                        cause: CryptoError::KnownValueMismatch,
                    }),
                    None => Outcome::Err(VaultError::UnknownVault { vault_id: id }),
                }
            },
        }
    }
}

fn apply_real(store: &VaultStore, op: &StoreOp) -> Outcome {
    match op {
        StoreOp::PutUnverified { seq, ciphertext } => {
            store.put_unverified(vault(*seq), ciphertext.clone()).into()
        },
        StoreOp::Promote { seq, plaintext } => {
            store.promote_to_verified(vault(*seq), plaintext.clone()).into()
        },
        StoreOp::PutLocal { seq, plaintext } => {
            store.put_verified_local(vault(*seq), plaintext.clone()).into()
        },
        StoreOp::Compromise { seq } => {
            Outcome::Flag(store.mark_compromised(&vault(*seq), CryptoError::KnownValueMismatch))
        },
        StoreOp::Release { seq } => Outcome::Flag(store.release(&vault(*seq))),
        StoreOp::Get { seq } => match store.get(&vault(*seq)) {
            Ok(plaintext) => Outcome::Value(plaintext),
            Err(e) => Outcome::Err(e),
        },
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_store_matches_model(ops in prop::collection::vec(store_op(), 1..40)) {
        let store = VaultStore::new();
        let mut model = ModelStore::default();

        for (step, op) in ops.iter().enumerate() {
            let expected = model.apply(op);
            let actual = apply_real(&store, op);
            prop_assert_eq!(actual, expected, "step {}: {:?}", step, op);
        }

        let model_entries: Vec<_> = model.entries.into_iter().collect();
        prop_assert_eq!(store.entries(), model_entries);
    }

    #[test]
    fn prop_release_always_forgets(
        ops in prop::collection::vec(store_op(), 0..20),
        seq in 0u64..4,
    ) {
        let store = VaultStore::new();
        for op in &ops {
            let _ = apply_real(&store, op);
        }

        store.release(&vault(seq));
        store.release(&vault(seq));

        prop_assert!(!store.is_known(&vault(seq)));
        prop_assert!(!store.known_ids().contains(&vault(seq)));
    }
}
