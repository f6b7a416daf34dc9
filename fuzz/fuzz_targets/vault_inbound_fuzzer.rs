//! Fuzz target for the vault engine's inbound handlers
//!
//! Drives one engine with an arbitrary mix of genuine, replayed, reordered,
//! forged and corrupted messages from a small set of peers.
//!
//! # Invariants
//!
//! - Handlers never panic
//! - A vault is readable only with the plaintext its creator sealed
//! - A vault that reported an integrity violation is never readable
//! - A released vault is never known again, whatever arrives later

#![no_main]

use std::collections::{HashMap, HashSet};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sealframe_core::{
    Broadcast, BroadcastError, EarlyUnlockPolicy, Environment, VaultConfig, VaultEngine,
    VaultError,
};
use sealframe_crypto::{SecretKey, seal};
use sealframe_proto::{LockPayload, NodeId, Payload, ReleasePayload, UnlockPayload, VaultId};

#[derive(Clone)]
struct NullBroadcast;

impl Broadcast for NullBroadcast {
    fn broadcast_lock(&self, _: &VaultId, _: &[u8]) -> Result<(), BroadcastError> {
        Ok(())
    }

    fn broadcast_unlock(&self, _: &VaultId, _: &[u8]) -> Result<(), BroadcastError> {
        Ok(())
    }

    fn broadcast_release(&self, _: &VaultId) -> Result<(), BroadcastError> {
        Ok(())
    }
}

#[derive(Clone)]
struct ZeroEnv;

impl Environment for ZeroEnv {
    fn random_bytes(&self, buffer: &mut [u8]) {
        buffer.fill(0);
    }
}

#[derive(Debug, Arbitrary)]
enum Step {
    Lock { peer: u8, seq: u8, data: Vec<u8>, flip: Option<u16> },
    Unlock { peer: u8, seq: u8 },
    ForgedUnlock { peer: u8, seq: u8, key: Vec<u8> },
    Release { from: u8, peer: u8, seq: u8 },
    Spoof { sender: u8, peer: u8, seq: u8 },
}

#[derive(Debug, Arbitrary)]
struct Input {
    buffer_early_unlocks: bool,
    steps: Vec<Step>,
}

fn vault(peer: u8, seq: u8) -> VaultId {
    VaultId::new(NodeId(u64::from(peer % 3) + 2), u64::from(seq % 8))
}

fuzz_target!(|input: Input| {
    let config = VaultConfig {
        early_unlock: if input.buffer_early_unlocks {
            EarlyUnlockPolicy::Buffer
        } else {
            EarlyUnlockPolicy::Reject
        },
        max_pending_unlocks: 4,
        ..Default::default()
    };
    let engine = VaultEngine::new(NodeId(1), NullBroadcast, ZeroEnv, config).unwrap();

    let mut sealed: HashMap<VaultId, (SecretKey, Vec<u8>)> = HashMap::new();
    let mut compromised = HashSet::new();
    let mut released = HashSet::new();

    for step in input.steps {
        let result = match step {
            Step::Lock { peer, seq, data, flip } => {
                let id = vault(peer, seq);
                if data.is_empty() {
                    continue;
                }
                let key = SecretKey::from_random([seq; 32]);
                let mut ciphertext = seal(&key, &data, [peer; 24]);
                if let Some(bit) = flip {
                    let bit = usize::from(bit) % (ciphertext.len() * 8);
                    ciphertext[bit / 8] ^= 1u8 << (bit % 8);
                }
                sealed.entry(id).or_insert((key, data));
                engine.handle(id.origin(), Payload::Lock(LockPayload { vault_id: id, ciphertext }))
            },
            Step::Unlock { peer, seq } => {
                let id = vault(peer, seq);
                let key = sealed.get(&id).map_or_else(|| vec![seq; 32], |(k, _)| k.to_bytes());
                engine.handle(id.origin(), Payload::Unlock(UnlockPayload { vault_id: id, key }))
            },
            Step::ForgedUnlock { peer, seq, key } => {
                let id = vault(peer, seq);
                engine.handle(id.origin(), Payload::Unlock(UnlockPayload { vault_id: id, key }))
            },
            Step::Release { from, peer, seq } => {
                let id = vault(peer, seq);
                sealed.remove(&id);
                compromised.remove(&id);
                released.insert(id);
                let release = Payload::Release(ReleasePayload { vault_id: id });
                engine.handle(NodeId(u64::from(from)), release)
            },
            Step::Spoof { sender, peer, seq } => {
                let id = vault(peer, seq);
                let sender = NodeId(u64::from(sender % 3) + 5);
                let unlock = Payload::Unlock(UnlockPayload { vault_id: id, key: vec![0; 32] });
                let result = engine.handle(sender, unlock);
                assert!(matches!(result, Err(VaultError::OriginMismatch { .. })));
                result
            },
        };

        if let Err(VaultError::IntegrityViolation { vault_id, .. }) = result {
            compromised.insert(vault_id);
        }

        for id in &released {
            assert!(!engine.knows_about(id), "released vault {id} came back");
        }

        for id in engine.known_ids() {
            if let Ok(plaintext) = engine.get(&id) {
                assert!(!compromised.contains(&id), "compromised vault {id} became readable");
                if let Some((_, expected)) = sealed.get(&id) {
                    assert_eq!(&plaintext, expected, "vault {id} opened to foreign bytes");
                }
            }
        }
    }
});
