//! Single-threaded simulated cluster.
//!
//! Delivery is explicit: nothing moves between nodes until a `deliver_*`
//! method is called, so tests control interleaving precisely. With
//! invariants enabled, the registry runs after every delivered frame.

use std::collections::{BTreeMap, BTreeSet};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sealframe_core::{
    Environment, FramedBroadcast, NodeId, VaultConfig, VaultEngine, VaultError, VaultId, VaultState,
};
use sealframe_proto::Frame;

use crate::{
    SimEnv,
    invariants::{InvariantRegistry, NodeSnapshot, SystemSnapshot},
    sim_network::{SimEndpoint, SimNetwork},
};

/// Engine type used by simulated nodes.
pub type SimEngine = VaultEngine<FramedBroadcast<SimEndpoint>, SimEnv>;

/// An error returned by a node while handling an inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeError {
    /// Node that reported the error.
    pub node: NodeId,
    /// What went wrong.
    pub error: VaultError,
}

/// Simulated cluster of vault engines on one in-memory network.
///
/// Node `i` has identity `NodeId(i + 1)`.
pub struct SimCluster {
    network: SimNetwork,
    nodes: Vec<SimEngine>,
    rng: ChaCha8Rng,
    errors: Vec<NodeError>,
    compromised_history: BTreeMap<NodeId, BTreeSet<VaultId>>,
    invariants: Option<InvariantRegistry>,
    delivered: u64,
}

impl SimCluster {
    /// Create a cluster of `num_nodes` nodes with default configuration.
    pub fn new(seed: u64, num_nodes: usize) -> Result<Self, VaultError> {
        Self::with_config(seed, num_nodes, &VaultConfig::default())
    }

    /// Create a cluster where every node uses `config`.
    pub fn with_config(
        seed: u64,
        num_nodes: usize,
        config: &VaultConfig,
    ) -> Result<Self, VaultError> {
        let env = SimEnv::with_seed(seed);
        let network = SimNetwork::new();

        let nodes = (0..num_nodes)
            .map(|i| {
                let node_id = NodeId(i as u64 + 1);
                let broadcast = FramedBroadcast::new(node_id, network.register(node_id));
                VaultEngine::new(node_id, broadcast, env.fork(), config.clone())
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            network,
            nodes,
            rng: ChaCha8Rng::seed_from_u64(env.random_u64()),
            errors: Vec::new(),
            compromised_history: BTreeMap::new(),
            invariants: None,
            delivered: 0,
        })
    }

    /// Check `registry` after every delivered frame.
    #[must_use]
    pub fn with_invariants(mut self, registry: InvariantRegistry) -> Self {
        self.invariants = Some(registry);
        self
    }

    /// Engine at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn node(&self, index: usize) -> &SimEngine {
        &self.nodes[index]
    }

    /// All engines.
    pub fn nodes(&self) -> &[SimEngine] {
        &self.nodes
    }

    /// Shared network, for fault injection.
    pub fn network(&self) -> &SimNetwork {
        &self.network
    }

    /// Errors reported by inbound handlers so far.
    pub fn errors(&self) -> &[NodeError] {
        &self.errors
    }

    /// Return and clear the recorded errors.
    pub fn take_errors(&mut self) -> Vec<NodeError> {
        std::mem::take(&mut self.errors)
    }

    /// Frames delivered so far.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Deliver the oldest frame queued for node `index`. Returns false if its
    /// inbox is empty.
    pub fn deliver_one(&mut self, index: usize) -> bool {
        let node_id = self.nodes[index].node_id();
        match self.network.pop(node_id) {
            Some(bytes) => {
                self.apply(index, &bytes);
                true
            },
            None => false,
        }
    }

    /// Deliver in FIFO order until every inbox is empty, including frames
    /// produced while delivering. Returns the number delivered.
    pub fn deliver_all(&mut self) -> u64 {
        let start = self.delivered;
        while self.network.total_pending() > 0 {
            for index in 0..self.nodes.len() {
                let node_id = self.nodes[index].node_id();
                for bytes in self.network.take(node_id) {
                    self.apply(index, &bytes);
                }
            }
        }
        self.delivered - start
    }

    /// Like [`deliver_all`](Self::deliver_all), but every inbox is shuffled
    /// before delivery and nodes are served in random order, one frame at a
    /// time.
    pub fn deliver_shuffled(&mut self) -> u64 {
        let start = self.delivered;
        for node_id in self.network.nodes() {
            self.network.shuffle(node_id, &mut self.rng);
        }
        while self.deliver_random_step() {}
        self.delivered - start
    }

    /// Deliver the next frame of a randomly chosen node with a non-empty
    /// inbox. Returns false if nothing is queued anywhere.
    pub fn deliver_random_step(&mut self) -> bool {
        let ready: Vec<usize> = (0..self.nodes.len())
            .filter(|&i| self.network.pending(self.nodes[i].node_id()) > 0)
            .collect();
        if ready.is_empty() {
            return false;
        }
        let index = ready[self.rng.gen_range(0..ready.len())];
        self.deliver_one(index)
    }

    fn apply(&mut self, index: usize, bytes: &[u8]) {
        let node_id = self.nodes[index].node_id();
        let result = Frame::decode(bytes)
            .map_err(VaultError::from)
            .and_then(|frame| self.nodes[index].handle_frame(&frame));

        if let Err(error) = result {
            tracing::debug!(node = %node_id, error = %error, "Simulated delivery failed");
            self.errors.push(NodeError { node: node_id, error });
        }
        self.delivered += 1;
        self.check_invariants();
    }

    fn check_invariants(&mut self) {
        let Some(registry) = self.invariants.take() else {
            return;
        };
        let snapshot = self.snapshot();
        registry.assert_all(&snapshot, &format!("after delivery {}", self.delivered));
        self.invariants = Some(registry);
    }

    /// Observable state of every node.
    ///
    /// Also updates the per-node compromised history used by
    /// [`CompromisedNeverUnlocked`](crate::CompromisedNeverUnlocked): ids
    /// currently compromised are added and ids no longer known are dropped.
    pub fn snapshot(&mut self) -> SystemSnapshot {
        let nodes = self
            .nodes
            .iter()
            .map(|engine| {
                let entries = engine.snapshot();
                let history = self.compromised_history.entry(engine.node_id()).or_default();

                history.retain(|id| entries.iter().any(|(known, _)| known == id));
                history.extend(
                    entries
                        .iter()
                        .filter(|(_, state)| *state == VaultState::Compromised)
                        .map(|(id, _)| *id),
                );

                NodeSnapshot {
                    id: engine.node_id(),
                    private_keys: engine.private_key_ids().into_iter().collect(),
                    compromised_history: history.clone(),
                    entries,
                }
            })
            .collect();
        SystemSnapshot::from_nodes(nodes)
    }
}
