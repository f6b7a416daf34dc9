//! Per-node vault store.
//!
//! Holds the two homes of a vault's payload: sealed bytes received from a
//! peer (unverified) and plaintext that has been revealed or was created
//! locally (verified). Every mutation wakes all waiters so that
//! [`WaitCoordinator`](crate::WaitCoordinator) can re-check its predicate.
//!
//! # Invariants
//!
//! - An id lives in at most one of the two maps at any time
//! - A compromised entry is never moved to the verified map
//! - Releasing is idempotent and never fails

#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::HashMap,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use sealframe_crypto::CryptoError;
use sealframe_proto::VaultId;
use zeroize::Zeroizing;

use crate::error::VaultError;

/// Observable state of one vault on one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultState {
    /// Sealed bytes held, key not yet revealed
    Sealed,
    /// Revealed key failed to open the sealed bytes
    Compromised,
    /// Plaintext available
    Unlocked(Vec<u8>),
}

struct SealedEntry {
    ciphertext: Vec<u8>,
    compromised: Option<CryptoError>,
}

#[derive(Default)]
struct StoreInner {
    unverified: HashMap<VaultId, SealedEntry>,
    verified: HashMap<VaultId, Zeroizing<Vec<u8>>>,
}

impl StoreInner {
    fn is_known(&self, id: &VaultId) -> bool {
        self.unverified.contains_key(id) || self.verified.contains_key(id)
    }

    fn is_unlocked(&self, id: &VaultId) -> bool {
        self.verified.contains_key(id)
    }
}

struct Shared {
    inner: Mutex<StoreInner>,
    changed: Condvar,
}

/// Concurrency-safe unverified/verified maps with change notification.
///
/// Cloning is cheap and yields a handle to the same store. Each operation
/// holds one internal lock for its whole duration, so operations on the same
/// id are mutually exclusive.
#[derive(Clone)]
pub struct VaultStore {
    shared: Arc<Shared>,
}

impl VaultStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(StoreInner::default()),
                changed: Condvar::new(),
            }),
        }
    }

    // A panic while holding the lock cannot leave the maps half-updated:
    // every mutation is a single insert or remove.
    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.shared.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        self.shared.changed.notify_all();
    }

    /// Record sealed bytes announced by a peer.
    ///
    /// # Errors
    ///
    /// `DuplicateVault` if the id is already present in either map.
    pub fn put_unverified(&self, id: VaultId, ciphertext: Vec<u8>) -> Result<(), VaultError> {
        {
            let mut inner = self.lock();
            if inner.is_known(&id) {
                return Err(VaultError::DuplicateVault { vault_id: id });
            }
            inner.unverified.insert(id, SealedEntry { ciphertext, compromised: None });
        }
        self.notify();
        Ok(())
    }

    /// Move a vault into the verified map with its opened plaintext.
    ///
    /// Removes the unverified entry if one exists. A vault that was never
    /// announced is still accepted.
    ///
    /// # Errors
    ///
    /// - `DuplicateVault` if the id is already verified
    /// - `IntegrityViolation` if the sealed entry was marked compromised
    pub fn promote_to_verified(&self, id: VaultId, plaintext: Vec<u8>) -> Result<(), VaultError> {
        let plaintext = Zeroizing::new(plaintext);
        {
            let mut inner = self.lock();
            if inner.is_unlocked(&id) {
                return Err(VaultError::DuplicateVault { vault_id: id });
            }
            if let Some(cause) = inner.unverified.get(&id).and_then(|e| e.compromised.clone()) {
                return Err(VaultError::IntegrityViolation { vault_id: id, cause });
            }
            inner.unverified.remove(&id);
            inner.verified.insert(id, plaintext);
        }
        self.notify();
        Ok(())
    }

    /// Store plaintext created on this node.
    ///
    /// # Errors
    ///
    /// `DuplicateVault` if the id is already present in either map.
    pub fn put_verified_local(&self, id: VaultId, plaintext: Vec<u8>) -> Result<(), VaultError> {
        let plaintext = Zeroizing::new(plaintext);
        {
            let mut inner = self.lock();
            if inner.is_known(&id) {
                return Err(VaultError::DuplicateVault { vault_id: id });
            }
            inner.verified.insert(id, plaintext);
        }
        self.notify();
        Ok(())
    }

    /// Forget a vault. Returns true if anything was removed.
    pub fn release(&self, id: &VaultId) -> bool {
        let removed = {
            let mut inner = self.lock();
            let sealed = inner.unverified.remove(id).is_some();
            let opened = inner.verified.remove(id).is_some();
            sealed || opened
        };
        self.notify();
        removed
    }

    /// Flag the sealed entry for `id` as tampered. Returns false if there is
    /// no sealed entry.
    pub fn mark_compromised(&self, id: &VaultId, cause: CryptoError) -> bool {
        let marked = {
            let mut inner = self.lock();
            match inner.unverified.get_mut(id) {
                Some(entry) => {
                    entry.compromised = Some(cause);
                    true
                },
                None => false,
            }
        };
        if marked {
            self.notify();
        }
        marked
    }

    /// True if the id is present in either map.
    pub fn is_known(&self, id: &VaultId) -> bool {
        self.lock().is_known(id)
    }

    /// True only if plaintext is available.
    pub fn is_unlocked(&self, id: &VaultId) -> bool {
        self.lock().is_unlocked(id)
    }

    /// Read the plaintext of an unlocked vault.
    ///
    /// # Errors
    ///
    /// - `NotUnlocked` if only sealed bytes are held
    /// - `IntegrityViolation` if the sealed bytes failed verification
    /// - `UnknownVault` if the id is in neither map
    pub fn get(&self, id: &VaultId) -> Result<Vec<u8>, VaultError> {
        let inner = self.lock();
        if let Some(plaintext) = inner.verified.get(id) {
            return Ok(plaintext.to_vec());
        }
        match inner.unverified.get(id) {
            Some(SealedEntry { compromised: Some(cause), .. }) => {
                Err(VaultError::IntegrityViolation { vault_id: *id, cause: cause.clone() })
            },
            Some(_) => Err(VaultError::NotUnlocked { vault_id: *id }),
            None => Err(VaultError::UnknownVault { vault_id: *id }),
        }
    }

    /// Sealed bytes awaiting a key.
    pub(crate) fn ciphertext(&self, id: &VaultId) -> Result<Vec<u8>, VaultError> {
        let inner = self.lock();
        if inner.is_unlocked(id) {
            return Err(VaultError::DuplicateVault { vault_id: *id });
        }
        match inner.unverified.get(id) {
            Some(SealedEntry { compromised: Some(cause), .. }) => {
                Err(VaultError::IntegrityViolation { vault_id: *id, cause: cause.clone() })
            },
            Some(entry) => Ok(entry.ciphertext.clone()),
            None => Err(VaultError::UnknownVault { vault_id: *id }),
        }
    }

    /// All ids present in either map, sorted.
    pub fn known_ids(&self) -> Vec<VaultId> {
        let inner = self.lock();
        let mut ids: Vec<VaultId> =
            inner.unverified.keys().chain(inner.verified.keys()).copied().collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Every map entry with its state, sorted by id.
    ///
    /// An id present in both maps appears twice. This never happens through
    /// the public operations; invariant checkers rely on seeing it if it did.
    pub fn entries(&self) -> Vec<(VaultId, VaultState)> {
        let inner = self.lock();
        let sealed = inner.unverified.iter().map(|(id, entry)| {
            let state = if entry.compromised.is_some() {
                VaultState::Compromised
            } else {
                VaultState::Sealed
            };
            (*id, state)
        });
        let opened = inner
            .verified
            .iter()
            .map(|(id, plaintext)| (*id, VaultState::Unlocked(plaintext.to_vec())));

        let mut entries: Vec<_> = sealed.chain(opened).collect();
        entries.sort_by_key(|(id, _)| *id);
        entries
    }

    /// Block until `condition` holds for `id` or `timeout` elapses. Returns
    /// whether it held when the wait ended.
    ///
    /// Re-checks on every store mutation and is safe against spurious wakeups.
    pub(crate) fn wait_for(&self, id: &VaultId, condition: Condition, timeout: Duration) -> bool {
        let guard = self.lock();
        let (guard, _timed_out) = self
            .shared
            .changed
            .wait_timeout_while(guard, timeout, |inner| !condition.holds(inner, id))
            .unwrap_or_else(PoisonError::into_inner);
        condition.holds(&guard, id)
    }
}

impl Default for VaultStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Predicates a waiter can block on.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Condition {
    Known,
    Unlocked,
    Forgotten,
}

impl Condition {
    fn holds(self, inner: &StoreInner, id: &VaultId) -> bool {
        match self {
            Self::Known => inner.is_known(id),
            Self::Unlocked => inner.is_unlocked(id),
            Self::Forgotten => !inner.is_known(id),
        }
    }
}
