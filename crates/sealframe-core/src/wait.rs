//! Blocking waits on vault state with timeouts.
//!
//! Waits are liveness helpers: reaching the timeout is not an error. Callers
//! inspect the returned flag (or re-query the store) to decide what to do.

use std::time::Duration;

use sealframe_proto::VaultId;

use crate::{
    error::VaultError,
    store::{Condition, VaultStore},
};

/// Blocks caller threads until a vault reaches a given state.
#[derive(Clone)]
pub struct WaitCoordinator {
    store: VaultStore,
}

impl WaitCoordinator {
    /// Wait on mutations of `store`.
    pub fn new(store: VaultStore) -> Self {
        Self { store }
    }

    /// Block until `id` is present in either map, or `timeout` elapses.
    ///
    /// Returns `Ok(true)` if the vault is known when the wait ends.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `timeout` is zero. There is no "block forever".
    pub fn wait_until_known(&self, id: &VaultId, timeout: Duration) -> Result<bool, VaultError> {
        self.wait(id, Condition::Known, timeout)
    }

    /// Block until plaintext for `id` is available, or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `timeout` is zero.
    pub fn wait_until_unlocked(&self, id: &VaultId, timeout: Duration) -> Result<bool, VaultError> {
        self.wait(id, Condition::Unlocked, timeout)
    }

    /// Block until `id` is in neither map, or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `timeout` is zero.
    pub fn wait_until_forgotten(
        &self,
        id: &VaultId,
        timeout: Duration,
    ) -> Result<bool, VaultError> {
        self.wait(id, Condition::Forgotten, timeout)
    }

    fn wait(
        &self,
        id: &VaultId,
        condition: Condition,
        timeout: Duration,
    ) -> Result<bool, VaultError> {
        if timeout.is_zero() {
            return Err(VaultError::InvalidArgument("wait timeout must be positive".into()));
        }
        Ok(self.store.wait_for(id, condition, timeout))
    }
}
