//! Promote and release of the same vault racing on one node.
//!
//! One thread applies the revealed key while another applies the release and
//! a third keeps sampling the store. Whichever transition wins, the vault
//! ends up forgotten, and at no sampled point does the node hold it in both
//! maps or with foreign bytes.

use std::{
    sync::{
        Barrier,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use sealframe_core::{NodeId, VaultError, VaultState};
use sealframe_harness::{Invariant, NodeSnapshot, SimCluster, SingleHome, SystemSnapshot};
use sealframe_proto::{Frame, Payload, ReleasePayload};

const ROUNDS: u64 = 200;

#[test]
fn unlock_racing_release_always_ends_forgotten() {
    let mut cluster = SimCluster::new(21, 2).unwrap();
    let (creator_id, peer_id) = (NodeId(1), NodeId(2));

    for round in 0..ROUNDS {
        let data = format!("round {round}").into_bytes();
        let id = cluster.node(0).lock(&data).unwrap();
        cluster.deliver_all();
        cluster.node(0).unlock(&id).unwrap();

        cluster.network().take(creator_id);
        let queued = cluster.network().take(peer_id);
        assert_eq!(queued.len(), 1);
        let unlock = Frame::decode(&queued[0]).unwrap();
        let release = Payload::Release(ReleasePayload { vault_id: id });

        let peer = cluster.node(1);
        let start = Barrier::new(3);
        let racing = AtomicBool::new(true);

        let (unlock_result, release_result) = thread::scope(|scope| {
            let (start, racing, data) = (&start, &racing, &data);

            let observer = scope.spawn(move || {
                start.wait();
                while racing.load(Ordering::Acquire) {
                    let entries = peer.snapshot();
                    for (vault_id, state) in &entries {
                        if *vault_id == id {
                            assert!(
                                matches!(state, VaultState::Sealed)
                                    || *state == VaultState::Unlocked(data.clone()),
                                "round {round}: unexpected state {state:?}"
                            );
                        }
                    }
                    let node = NodeSnapshot { entries, ..NodeSnapshot::new(peer_id) };
                    SingleHome.check(&SystemSnapshot::from_nodes(vec![node])).unwrap();
                }
            });
            let unlocker = scope.spawn(move || {
                start.wait();
                peer.handle_frame(&unlock)
            });
            let releaser = scope.spawn(move || {
                start.wait();
                peer.handle(creator_id, release)
            });

            let results = (unlocker.join().unwrap(), releaser.join().unwrap());
            racing.store(false, Ordering::Release);
            observer.join().unwrap();
            results
        });

        assert_eq!(release_result, Ok(()));
        match unlock_result {
            Ok(()) => {},
            Err(VaultError::Released { vault_id }) => assert_eq!(vault_id, id),
            Err(other) => panic!("round {round}: unlock failed with {other}"),
        }

        assert!(!peer.knows_about(&id));
        assert!(peer.snapshot().is_empty());
        assert!(peer.is_released(&id));
        assert_eq!(peer.get(&id), Err(VaultError::UnknownVault { vault_id: id }));
    }
}
