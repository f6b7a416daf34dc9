//! Sealframe commit-then-reveal vaults.
//!
//! Any node can publish data to its peer group in sealed form with
//! [`VaultEngine::lock`], reveal it later with [`VaultEngine::unlock`], and
//! discard it everywhere with [`VaultEngine::release`]. Peers never have to
//! trust the creator before the reveal: a forged or corrupted key/ciphertext
//! pairing is detected when the key arrives and the vault is never promoted.
//!
//! # Architecture
//!
//! ```text
//!   caller threads                         transport dispatch threads
//!        │ lock / unlock / release / get            │ handle_frame
//!        ▼                                          ▼
//!   ┌────────────────────────── VaultEngine ──────────────────────────┐
//!   │  key table (VaultId → SecretKey)   pending early unlocks        │
//!   └───────┬──────────────────────────────────────────┬──────────────┘
//!           │                                          │
//!           ▼                                          ▼
//!   VaultStore (unverified / verified, Condvar)    Broadcast (collaborator)
//!           ▲
//!           │ wait_until_known / wait_until_unlocked
//!   WaitCoordinator
//! ```
//!
//! # Components
//!
//! - [`VaultEngine`]: Protocol state machine (lock, unlock, release, inbound
//!   handlers)
//! - [`VaultStore`]: Concurrency-safe unverified/verified maps with change
//!   notification
//! - [`WaitCoordinator`]: Blocking waits with timeouts
//! - [`Broadcast`]: Outbound contract implemented by the transport
//! - [`Environment`]: Randomness source (system or seeded simulation)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod broadcast;
pub mod config;
pub mod engine;
pub mod env;
pub mod error;
pub mod store;
mod system_env;
pub mod wait;

pub use broadcast::{Broadcast, FrameSink, FramedBroadcast};
pub use config::{EarlyUnlockPolicy, VaultConfig};
pub use engine::VaultEngine;
pub use env::Environment;
pub use error::{BroadcastError, VaultError};
pub use sealframe_proto::{NodeId, VaultId};
pub use store::{VaultState, VaultStore};
pub use system_env::SystemEnv;
pub use wait::WaitCoordinator;
