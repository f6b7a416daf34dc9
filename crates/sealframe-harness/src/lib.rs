//! Deterministic simulation harness for sealframe vault testing.
//!
//! Provides a seeded [`Environment`](sealframe_core::Environment), an
//! in-memory broadcast network with fault injection, and two cluster
//! drivers:
//!
//! - [`SimCluster`]: single-threaded, step-wise delivery. Every run with the
//!   same seed and operations produces the same result.
//! - [`ThreadedCluster`]: one dispatch thread per node, for exercising the
//!   blocking wait API the way an embedding application would.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks behavioral properties against a
//! [`SystemSnapshot`] taken from all nodes. Use
//! [`InvariantRegistry::standard()`] for the vault invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cluster;
pub mod invariants;
pub mod sim_env;
pub mod sim_network;
pub mod threaded;

pub use cluster::{NodeError, SimCluster, SimEngine};
pub use invariants::{
    CompromisedNeverUnlocked, Invariant, InvariantRegistry, InvariantResult, NoPrematureReveal,
    NodeSnapshot, PlaintextAgreement, SingleHome, SystemSnapshot, Violation,
};
pub use sim_env::SimEnv;
pub use sim_network::{SimEndpoint, SimNetwork};
pub use threaded::{ThreadedCluster, ThreadedEngine, ThreadedSink};
