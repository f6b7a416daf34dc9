//! Vault protocol engine.
//!
//! Drives the lock → unlock → release lifecycle for vaults created on this
//! node and applies the corresponding messages received from peers.
//!
//! # Per-vault states
//!
//! ```text
//!   creator:  lock ──► LockedLocal (key private) ──unlock──► Unlocked ──release──► gone
//!   peer:     Lock msg ──► Sealed ──Unlock msg──► Unlocked ──Release msg──► gone
//!                             └──bad key/tamper──► Compromised ──Release msg──► gone
//! ```
//!
//! A peer that misses the lock may see the unlock first. Depending on
//! [`EarlyUnlockPolicy`] the key is either rejected or parked until the lock
//! arrives.
//!
//! Release is terminal. Each engine remembers the most recent
//! `max_released_ids` released ids and refuses any later lock or unlock for
//! them with `VaultError::Released`, whatever order the messages arrive in.
//!
//! # Concurrency
//!
//! Caller threads and transport dispatch threads may use the engine at the
//! same time. Locks are always taken in the order key table → inbound state
//! → store. The inbound lock covers parked unlocks and released ids and is
//! held across every inbound transition, so a concurrent release cannot be
//! overtaken by a promotion of the same vault.

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use sealframe_crypto::{SEAL_OVERHEAD, SecretKey, open, seal};
use sealframe_proto::{
    Frame, LockPayload, NodeId, Payload, ReleasePayload, UnlockPayload, VaultId,
};
use zeroize::Zeroizing;

use crate::{
    broadcast::Broadcast,
    config::{EarlyUnlockPolicy, VaultConfig},
    env::Environment,
    error::VaultError,
    store::{VaultState, VaultStore},
    wait::WaitCoordinator,
};

type PendingUnlocks = HashMap<VaultId, Zeroizing<Vec<u8>>>;

/// Released ids, oldest first, bounded by the caller-supplied capacity.
#[derive(Default)]
struct ReleasedIds {
    order: VecDeque<VaultId>,
    members: HashSet<VaultId>,
}

impl ReleasedIds {
    fn contains(&self, vault_id: &VaultId) -> bool {
        self.members.contains(vault_id)
    }

    fn insert(&mut self, vault_id: VaultId, capacity: usize) {
        if !self.members.insert(vault_id) {
            return;
        }
        self.order.push_back(vault_id);
        while self.order.len() > capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.members.remove(&evicted);
            }
        }
    }
}

/// State touched by inbound transitions, guarded by one lock.
#[derive(Default)]
struct Inbound {
    pending: PendingUnlocks,
    released: ReleasedIds,
}

/// Commit-then-reveal protocol engine for one node.
///
/// Owns the node's [`VaultStore`], the private keys of vaults it created and
/// have not yet been unlocked, and the outbound [`Broadcast`] collaborator.
pub struct VaultEngine<B, E> {
    node_id: NodeId,
    store: VaultStore,
    waits: WaitCoordinator,
    keys: Mutex<HashMap<VaultId, SecretKey>>,
    inbound: Mutex<Inbound>,
    next_seq: AtomicU64,
    broadcast: B,
    env: E,
    config: VaultConfig,
}

impl<B: Broadcast, E: Environment> VaultEngine<B, E> {
    /// Create an engine for `node_id`.
    ///
    /// The vault sequence counter starts at a random multiple of 2^32 so that
    /// a restarted node does not reissue ids it handed out before.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `config` fails validation.
    pub fn new(
        node_id: NodeId,
        broadcast: B,
        env: E,
        config: VaultConfig,
    ) -> Result<Self, VaultError> {
        config.validate()?;

        let seq_base = (env.random_u64() >> 32) << 32;
        let store = VaultStore::new();

        tracing::debug!(node = %node_id, seq_base, "Vault engine created");

        Ok(Self {
            node_id,
            waits: WaitCoordinator::new(store.clone()),
            store,
            keys: Mutex::new(HashMap::new()),
            inbound: Mutex::new(Inbound::default()),
            next_seq: AtomicU64::new(seq_base),
            broadcast,
            env,
            config,
        })
    }

    /// Identity of the local node.
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Active configuration.
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// The local store.
    pub fn store(&self) -> &VaultStore {
        &self.store
    }

    /// Blocking waits on the local store.
    pub fn waits(&self) -> &WaitCoordinator {
        &self.waits
    }

    /// Outbound collaborator.
    pub fn broadcast(&self) -> &B {
        &self.broadcast
    }

    fn keys(&self) -> MutexGuard<'_, HashMap<VaultId, SecretKey>> {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn inbound(&self) -> MutexGuard<'_, Inbound> {
        self.inbound.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_vault_id(&self) -> VaultId {
        VaultId::new(self.node_id, self.next_seq.fetch_add(1, Ordering::Relaxed))
    }

    /// Seal `plaintext` and announce it to every peer.
    ///
    /// The plaintext is readable locally as soon as this returns; peers only
    /// receive the sealed bytes.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `plaintext` is empty or exceeds
    ///   `max_plaintext_len`
    /// - `Broadcast` if the announcement could not be sent. No local state
    ///   is kept in that case.
    pub fn lock(&self, plaintext: &[u8]) -> Result<VaultId, VaultError> {
        let vault_id = self.next_vault_id();
        self.lock_with_id(vault_id, plaintext)
    }

    /// [`lock`](Self::lock) with a caller-chosen id.
    ///
    /// # Errors
    ///
    /// As [`lock`](Self::lock), plus:
    ///
    /// - `NotOwner` if `vault_id.origin` is not this node
    /// - `DuplicateVault` if the id is already known here
    /// - `Released` if the id was released here
    pub fn lock_with_id(
        &self,
        vault_id: VaultId,
        plaintext: &[u8],
    ) -> Result<VaultId, VaultError> {
        self.check_plaintext(plaintext)?;
        if vault_id.origin() != self.node_id {
            return Err(VaultError::NotOwner { vault_id, caller: self.node_id });
        }

        let key = SecretKey::from_random(self.env.random_array());
        let ciphertext = seal(&key, plaintext, self.env.random_array());

        {
            let mut keys = self.keys();
            if self.inbound().released.contains(&vault_id) {
                return Err(VaultError::Released { vault_id });
            }
            self.store.put_verified_local(vault_id, plaintext.to_vec())?;
            keys.insert(vault_id, key);
        }

        tracing::debug!(
            node = %self.node_id,
            vault_id = %vault_id,
            plaintext_len = plaintext.len(),
            "Vault locked"
        );

        if let Err(e) = self.broadcast.broadcast_lock(&vault_id, &ciphertext) {
            tracing::warn!(
                node = %self.node_id,
                vault_id = %vault_id,
                error = %e,
                "Lock broadcast failed, discarding vault"
            );
            self.forget(&vault_id);
            return Err(e.into());
        }

        Ok(vault_id)
    }

    fn check_plaintext(&self, plaintext: &[u8]) -> Result<(), VaultError> {
        if plaintext.is_empty() {
            return Err(VaultError::InvalidArgument("vault data must not be empty".into()));
        }
        if plaintext.len() > self.config.max_plaintext_len {
            return Err(VaultError::InvalidArgument(format!(
                "vault data is {} bytes, limit is {}",
                plaintext.len(),
                self.config.max_plaintext_len
            )));
        }
        Ok(())
    }

    /// Reveal the key of a vault created on this node.
    ///
    /// The key leaves the private key table before it is broadcast. If the
    /// broadcast fails the key is put back so the call can be retried, unless
    /// the vault was released in the meantime.
    ///
    /// # Errors
    ///
    /// - `NotOwner` if another node created the vault. Nothing is sent.
    /// - `AlreadyUnlocked` if the key was already revealed
    /// - `UnknownVault` if this node holds nothing for the id
    /// - `Broadcast` if sending failed
    pub fn unlock(&self, vault_id: &VaultId) -> Result<(), VaultError> {
        if vault_id.origin() != self.node_id {
            return Err(VaultError::NotOwner { vault_id: *vault_id, caller: self.node_id });
        }

        let Some(key) = self.keys().remove(vault_id) else {
            return Err(if self.store.is_known(vault_id) {
                VaultError::AlreadyUnlocked { vault_id: *vault_id }
            } else {
                VaultError::UnknownVault { vault_id: *vault_id }
            });
        };

        let key_bytes = Zeroizing::new(key.to_bytes());
        if let Err(e) = self.broadcast.broadcast_unlock(vault_id, &key_bytes) {
            let mut keys = self.keys();
            if self.store.is_known(vault_id) {
                keys.insert(*vault_id, key);
            }
            tracing::warn!(
                node = %self.node_id,
                vault_id = %vault_id,
                error = %e,
                "Unlock broadcast failed"
            );
            return Err(e.into());
        }

        tracing::debug!(node = %self.node_id, vault_id = %vault_id, "Vault key revealed");
        Ok(())
    }

    /// Drop a vault here and ask every peer to do the same.
    ///
    /// Any node may release any vault, known or not. Local state is gone even
    /// if the broadcast fails, and the id is remembered as released.
    ///
    /// # Errors
    ///
    /// `Broadcast` if sending the release notice failed.
    pub fn release(&self, vault_id: &VaultId) -> Result<(), VaultError> {
        self.forget(vault_id);
        self.broadcast.broadcast_release(vault_id)?;
        Ok(())
    }

    fn forget(&self, vault_id: &VaultId) -> bool {
        let mut keys = self.keys();
        let mut inbound = self.inbound();

        inbound.released.insert(*vault_id, self.config.max_released_ids);
        let had_key = keys.remove(vault_id).is_some();
        let had_pending = inbound.pending.remove(vault_id).is_some();
        let had_entry = self.store.release(vault_id);

        let removed = had_key || had_pending || had_entry;
        if removed {
            tracing::debug!(node = %self.node_id, vault_id = %vault_id, "Vault released");
        }
        removed
    }

    /// True if plaintext for the vault is readable here.
    pub fn is_unlocked(&self, vault_id: &VaultId) -> bool {
        self.store.is_unlocked(vault_id)
    }

    /// True if this node holds sealed bytes or plaintext for the vault.
    pub fn knows_about(&self, vault_id: &VaultId) -> bool {
        self.store.is_known(vault_id)
    }

    /// Every vault known here, sorted.
    pub fn known_ids(&self) -> Vec<VaultId> {
        self.store.known_ids()
    }

    /// Read the plaintext of an unlocked vault.
    ///
    /// # Errors
    ///
    /// `NotUnlocked`, `UnknownVault` or `IntegrityViolation`, see
    /// [`VaultStore::get`].
    pub fn get(&self, vault_id: &VaultId) -> Result<Vec<u8>, VaultError> {
        self.store.get(vault_id)
    }

    /// True if the vault was released here and is still remembered.
    pub fn is_released(&self, vault_id: &VaultId) -> bool {
        self.inbound().released.contains(vault_id)
    }

    /// See [`WaitCoordinator::wait_until_known`].
    pub fn wait_until_known(
        &self,
        vault_id: &VaultId,
        timeout: Duration,
    ) -> Result<bool, VaultError> {
        self.waits.wait_until_known(vault_id, timeout)
    }

    /// See [`WaitCoordinator::wait_until_unlocked`].
    pub fn wait_until_unlocked(
        &self,
        vault_id: &VaultId,
        timeout: Duration,
    ) -> Result<bool, VaultError> {
        self.waits.wait_until_unlocked(vault_id, timeout)
    }

    /// See [`WaitCoordinator::wait_until_forgotten`].
    pub fn wait_until_forgotten(
        &self,
        vault_id: &VaultId,
        timeout: Duration,
    ) -> Result<bool, VaultError> {
        self.waits.wait_until_forgotten(vault_id, timeout)
    }

    /// State of every vault in the local store, sorted by id.
    pub fn snapshot(&self) -> Vec<(VaultId, VaultState)> {
        self.store.entries()
    }

    /// Vaults whose key has not been revealed yet, sorted.
    pub fn private_key_ids(&self) -> Vec<VaultId> {
        let mut ids: Vec<_> = self.keys().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Vaults with a parked early unlock, sorted.
    pub fn pending_unlock_ids(&self) -> Vec<VaultId> {
        let mut ids: Vec<_> = self.inbound().pending.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Decode an inbound frame and apply it.
    ///
    /// # Errors
    ///
    /// `Protocol` if the payload does not decode, otherwise see
    /// [`handle`](Self::handle).
    pub fn handle_frame(&self, frame: &Frame) -> Result<(), VaultError> {
        let sender = frame.header.sender_id();
        let payload = Payload::from_frame(frame).inspect_err(|e| {
            tracing::warn!(
                node = %self.node_id,
                sender = %sender,
                error = %e,
                "Undecodable frame"
            );
        })?;
        self.handle(sender, payload)
    }

    /// Apply a message received from `sender`.
    ///
    /// Messages the transport looped back from this node are ignored.
    ///
    /// # Errors
    ///
    /// - `OriginMismatch` if a lock or unlock was not sent by the vault's
    ///   creator
    /// - `DuplicateVault` for a re-announced or re-unlocked vault
    /// - `IntegrityViolation` if a revealed key does not open the vault
    /// - `UnlockBeforeLock` / `PendingUnlocksFull` for early unlocks
    /// - `Released` for a lock or unlock of a vault released here
    /// - `InvalidArgument` for oversized sealed bytes
    pub fn handle(&self, sender: NodeId, payload: Payload) -> Result<(), VaultError> {
        match payload {
            Payload::Lock(lock) => self.on_lock(sender, lock),
            Payload::Unlock(unlock) => self.on_unlock(sender, unlock),
            Payload::Release(release) => self.on_release(sender, &release),
        }
    }

    fn check_origin(&self, sender: NodeId, vault_id: &VaultId) -> Result<(), VaultError> {
        if vault_id.origin() == sender {
            return Ok(());
        }
        tracing::error!(
            node = %self.node_id,
            vault_id = %vault_id,
            sender = %sender,
            "Vault message not sent by its origin"
        );
        Err(VaultError::OriginMismatch { vault_id: *vault_id, sender })
    }

    fn check_not_released(&self, inbound: &Inbound, vault_id: &VaultId) -> Result<(), VaultError> {
        if !inbound.released.contains(vault_id) {
            return Ok(());
        }
        tracing::debug!(
            node = %self.node_id,
            vault_id = %vault_id,
            "Late message for released vault"
        );
        Err(VaultError::Released { vault_id: *vault_id })
    }

    fn on_lock(&self, sender: NodeId, lock: LockPayload) -> Result<(), VaultError> {
        let LockPayload { vault_id, ciphertext } = lock;
        if sender == self.node_id {
            return Ok(());
        }
        self.check_origin(sender, &vault_id)?;

        let max_len = self.config.max_plaintext_len + SEAL_OVERHEAD;
        if ciphertext.len() > max_len {
            tracing::warn!(
                node = %self.node_id,
                vault_id = %vault_id,
                len = ciphertext.len(),
                max_len,
                "Oversized sealed vault"
            );
            return Err(VaultError::InvalidArgument(format!(
                "sealed vault is {} bytes, limit is {max_len}",
                ciphertext.len()
            )));
        }

        let mut inbound = self.inbound();
        self.check_not_released(&inbound, &vault_id)?;
        self.store.put_unverified(vault_id, ciphertext).inspect_err(|e| {
            tracing::warn!(
                node = %self.node_id,
                vault_id = %vault_id,
                error = %e,
                "Lock rejected"
            );
        })?;

        tracing::debug!(node = %self.node_id, vault_id = %vault_id, "Sealed vault stored");

        match inbound.pending.remove(&vault_id) {
            Some(key) => {
                tracing::debug!(
                    node = %self.node_id,
                    vault_id = %vault_id,
                    "Applying buffered unlock"
                );
                let ciphertext = self.store.ciphertext(&vault_id)?;
                self.open_and_promote(vault_id, &ciphertext, &key)
            },
            None => Ok(()),
        }
    }

    fn on_unlock(&self, sender: NodeId, unlock: UnlockPayload) -> Result<(), VaultError> {
        let vault_id = unlock.vault_id;
        let key = Zeroizing::new(unlock.key);
        if sender == self.node_id {
            return Ok(());
        }
        self.check_origin(sender, &vault_id)?;

        let mut inbound = self.inbound();
        self.check_not_released(&inbound, &vault_id)?;
        match self.store.ciphertext(&vault_id) {
            Ok(ciphertext) => self.open_and_promote(vault_id, &ciphertext, &key),
            Err(VaultError::UnknownVault { .. }) => {
                self.defer_unlock(&mut inbound.pending, vault_id, key)
            },
            Err(e) => {
                tracing::warn!(
                    node = %self.node_id,
                    vault_id = %vault_id,
                    error = %e,
                    "Unlock rejected"
                );
                Err(e)
            },
        }
    }

    fn defer_unlock(
        &self,
        pending: &mut PendingUnlocks,
        vault_id: VaultId,
        key: Zeroizing<Vec<u8>>,
    ) -> Result<(), VaultError> {
        match self.config.early_unlock {
            EarlyUnlockPolicy::Reject => {
                tracing::warn!(
                    node = %self.node_id,
                    vault_id = %vault_id,
                    "Unlock arrived before its lock"
                );
                Err(VaultError::UnlockBeforeLock { vault_id })
            },
            EarlyUnlockPolicy::Buffer => {
                let capacity = self.config.max_pending_unlocks;
                if pending.len() >= capacity && !pending.contains_key(&vault_id) {
                    tracing::warn!(
                        node = %self.node_id,
                        vault_id = %vault_id,
                        capacity,
                        "Pending unlock buffer full"
                    );
                    return Err(VaultError::PendingUnlocksFull { capacity });
                }
                pending.insert(vault_id, key);
                tracing::debug!(node = %self.node_id, vault_id = %vault_id, "Unlock buffered");
                Ok(())
            },
        }
    }

    /// Open sealed bytes with a revealed key and promote on success.
    ///
    /// # Security
    ///
    /// Any failure, including a malformed key, marks the vault compromised.
    /// It stays unreadable until released.
    fn open_and_promote(
        &self,
        vault_id: VaultId,
        ciphertext: &[u8],
        key_bytes: &[u8],
    ) -> Result<(), VaultError> {
        match SecretKey::from_bytes(key_bytes).and_then(|key| open(&key, ciphertext)) {
            Ok(plaintext) => {
                self.store.promote_to_verified(vault_id, plaintext)?;
                tracing::debug!(node = %self.node_id, vault_id = %vault_id, "Vault unlocked");
                Ok(())
            },
            Err(cause) => {
                self.store.mark_compromised(&vault_id, cause.clone());
                tracing::error!(
                    node = %self.node_id,
                    vault_id = %vault_id,
                    error = %cause,
                    tamper = cause.is_tamper_signal(),
                    "Integrity violation, vault will not be unlocked"
                );
                Err(VaultError::IntegrityViolation { vault_id, cause })
            },
        }
    }

    fn on_release(&self, sender: NodeId, release: &ReleasePayload) -> Result<(), VaultError> {
        if self.forget(&release.vault_id) {
            tracing::debug!(
                node = %self.node_id,
                vault_id = %release.vault_id,
                sender = %sender,
                "Release applied"
            );
        }
        Ok(())
    }
}
