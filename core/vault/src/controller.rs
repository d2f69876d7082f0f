//! Vault controller.
//!
//! Owns the session of a single account: the derived key while unlocked,
//! the decrypted item list, and the rules for mutating it through a
//! [`RemoteVaultStore`].
//!
//! The in-memory list is only ever replaced wholesale from an authoritative
//! store response. Session state lives behind a `std::sync::Mutex` that is
//! never held across an `.await`; every in-flight operation remembers the
//! session generation it started in and drops its result if the vault was
//! locked meanwhile.

use chrono::Utc;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::codec;
use crate::config::ControllerConfig;
use crate::item::{ItemDraft, VaultItem};
use crate::reconcile::{reconcile, Reconciled, UnlockReport};
use passvault_common::{AccountId, EncryptedItem, Error, Result, VaultMeta, VaultSnapshot};
use passvault_crypto::{derive_key_async, encrypt, generate_salt, VaultKey};
use passvault_storage::RemoteVaultStore;

/// Observable state of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultState {
    /// No key in memory.
    Locked,
    /// Deriving the key and loading items.
    Unlocking,
    /// Key in memory, items available.
    Unlocked,
}

/// An unlocked session. Dropping it releases the key and wipes the items.
struct Session {
    generation: u64,
    key: Arc<VaultKey>,
    meta: VaultMeta,
    items: Vec<VaultItem>,
    report: UnlockReport,
}

enum SessionState {
    Locked,
    Unlocking { generation: u64 },
    Unlocked(Session),
}

impl SessionState {
    fn is_unlocking(&self, generation: u64) -> bool {
        matches!(self, SessionState::Unlocking { generation: current } if *current == generation)
    }
}

/// What an in-flight operation needs from the session it started in.
struct ActiveSession {
    generation: u64,
    key: Arc<VaultKey>,
}

/// Controller for one account's vault.
///
/// All operations take `&self`, so a controller can be shared behind an
/// `Arc`. At most one mutation runs at a time; a concurrent attempt is
/// rejected with `Error::State`.
pub struct VaultController {
    account: AccountId,
    store: Arc<dyn RemoteVaultStore>,
    config: ControllerConfig,
    state: Mutex<SessionState>,
    generation: AtomicU64,
    mutating: AtomicBool,
}

impl VaultController {
    /// Create a locked controller.
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn new(
        account: AccountId,
        store: Arc<dyn RemoteVaultStore>,
        config: ControllerConfig,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            account,
            store,
            config,
            state: Mutex::new(SessionState::Locked),
            generation: AtomicU64::new(0),
            mutating: AtomicBool::new(false),
        })
    }

    /// Account this controller manages.
    pub fn account(&self) -> &AccountId {
        &self.account
    }

    /// Controller configuration.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Current state.
    pub fn state(&self) -> VaultState {
        match &*self.lock_state() {
            SessionState::Locked => VaultState::Locked,
            SessionState::Unlocking { .. } => VaultState::Unlocking,
            SessionState::Unlocked(_) => VaultState::Unlocked,
        }
    }

    /// Decrypted items, most recently added first.
    ///
    /// # Errors
    /// - `Error::State` unless unlocked
    pub fn items(&self) -> Result<Vec<VaultItem>> {
        match &*self.lock_state() {
            SessionState::Unlocked(session) => Ok(session.items.clone()),
            _ => Err(locked_error()),
        }
    }

    /// Look up a decrypted item by id.
    ///
    /// # Errors
    /// - `Error::State` unless unlocked
    pub fn item(&self, id: &str) -> Result<Option<VaultItem>> {
        match &*self.lock_state() {
            SessionState::Unlocked(session) => {
                Ok(session.items.iter().find(|item| item.id == id).cloned())
            }
            _ => Err(locked_error()),
        }
    }

    /// Vault metadata of the unlocked session.
    pub fn meta(&self) -> Option<VaultMeta> {
        match &*self.lock_state() {
            SessionState::Unlocked(session) => Some(session.meta.clone()),
            _ => None,
        }
    }

    /// Report of the last unlock, refresh or mutation.
    pub fn last_report(&self) -> Option<UnlockReport> {
        match &*self.lock_state() {
            SessionState::Unlocked(session) => Some(session.report),
            _ => None,
        }
    }

    /// Create the vault for a fresh account and unlock it.
    ///
    /// # Preconditions
    /// - Controller is locked
    /// - The store holds no metadata for the account
    ///
    /// # Postconditions
    /// - Metadata with a random salt is stored
    /// - Controller is unlocked
    ///
    /// # Errors
    /// - `Error::AlreadyExists` if the account already has a vault; the store
    ///   is left untouched
    /// - `Error::State` if not locked
    /// - Store and KDF failures
    pub async fn bootstrap(&self, password: &[u8]) -> Result<()> {
        let unlocking = self.begin_unlocking()?;

        if self.call(self.store.get_meta(&self.account)).await?.is_some() {
            warn!(account = %self.account, "Refusing to bootstrap an existing vault");
            return Err(Error::AlreadyExists(format!(
                "Vault for account '{}' already exists",
                self.account
            )));
        }

        let meta = VaultMeta::new(generate_salt(), self.config.iterations)?;
        let key = derive_key_async(password, meta.salt, meta.iterations).await?;
        let meta = self.call(self.store.set_meta(&self.account, meta)).await?;
        info!(account = %self.account, iterations = meta.iterations, "Vault created");

        let snapshot = self.call(self.store.fetch(&self.account)).await?;
        let reconciled = reconcile(&key, &snapshot);
        unlocking.finish(key, meta, reconciled)?;

        Ok(())
    }

    /// Unlock an existing vault.
    ///
    /// Items that fail to decrypt are skipped and counted. If there are
    /// items and none decrypt, the report says `LikelyWrongPassword` and the
    /// controller stays locked; this is not an error.
    ///
    /// # Errors
    /// - `Error::NotFound` if the account has no vault
    /// - `Error::State` if not locked, or if locked again while unlocking
    /// - Store and KDF failures
    pub async fn unlock(&self, password: &[u8]) -> Result<UnlockReport> {
        let unlocking = self.begin_unlocking()?;

        let snapshot = self.call(self.store.fetch(&self.account)).await?;
        let meta = snapshot.meta.clone().ok_or_else(|| {
            Error::NotFound(format!("No vault for account '{}'", self.account))
        })?;
        meta.validate()?;

        let key = derive_key_async(password, meta.salt, meta.iterations).await?;
        let reconciled = reconcile(&key, &snapshot);
        let report = reconciled.report;

        if report.likely_wrong_password() {
            warn!(
                account = %self.account,
                total = report.total,
                "No item could be decrypted, password is likely wrong"
            );
            // Dropping `unlocking` returns to Locked and releases the key.
            return Ok(report);
        }

        unlocking.finish(key, meta, reconciled)?;
        Ok(report)
    }

    /// Encrypt and store a new item.
    ///
    /// Returns the id assigned to the item.
    ///
    /// # Errors
    /// - `Error::State` if locked or another mutation is running
    /// - `Error::InvalidInput` for an invalid draft
    /// - Store failures; the item list is left unchanged
    pub async fn add_item(&self, draft: ItemDraft) -> Result<String> {
        draft.validate()?;
        let _slot = self.begin_mutation()?;
        let session = self.active_session()?;

        let encrypted = self.seal(&session, &draft)?;
        let id = encrypted.id.clone();
        let snapshot = self.call(self.store.append_item(&self.account, encrypted)).await?;
        self.apply(&session, &snapshot)?;

        info!(account = %self.account, item_id = %id, "Item added");
        Ok(id)
    }

    /// Remove an item. Removing an id that doesn't exist succeeds.
    ///
    /// # Errors
    /// - `Error::State` if locked or another mutation is running
    /// - Store failures; the item list is left unchanged
    pub async fn delete_item(&self, id: &str) -> Result<()> {
        let _slot = self.begin_mutation()?;
        let session = self.active_session()?;

        let snapshot = self.call(self.store.remove_item(&self.account, id)).await?;
        if snapshot.contains(id) {
            return Err(Error::Store(format!(
                "{} store still lists removed item {}",
                self.store.name(),
                id
            )));
        }
        self.apply(&session, &snapshot)?;

        info!(account = %self.account, item_id = %id, "Item deleted");
        Ok(())
    }

    /// Replace an item's content.
    ///
    /// Items are immutable in the store, so the new content is appended
    /// under a fresh id and the old item removed afterwards. Returns the
    /// new id.
    ///
    /// # Errors
    /// - `Error::NotFound` if `id` is not in the current list
    /// - `Error::State` if locked or another mutation is running
    /// - Store failures. If the removal fails after the append succeeded,
    ///   both items are kept and the list reflects that.
    pub async fn update_item(&self, id: &str, draft: ItemDraft) -> Result<String> {
        draft.validate()?;
        let _slot = self.begin_mutation()?;
        let session = self.active_session()?;

        if self.item(id)?.is_none() {
            return Err(Error::NotFound(format!("Item '{}' not found", id)));
        }

        let encrypted = self.seal(&session, &draft)?;
        let new_id = encrypted.id.clone();
        let appended = self.call(self.store.append_item(&self.account, encrypted)).await?;

        match self.call(self.store.remove_item(&self.account, id)).await {
            Ok(snapshot) => {
                self.apply(&session, &snapshot)?;
            }
            Err(e) => {
                warn!(
                    account = %self.account,
                    item_id = %id,
                    new_item_id = %new_id,
                    error = %e,
                    "Old item could not be removed after update"
                );
                self.apply(&session, &appended)?;
                return Err(e);
            }
        }

        info!(account = %self.account, item_id = %id, new_item_id = %new_id, "Item updated");
        Ok(new_id)
    }

    /// Reload the item list from the store.
    ///
    /// Takes the mutation slot, so it is rejected while a mutation runs.
    ///
    /// # Errors
    /// - `Error::State` if locked or a mutation is running
    /// - Store failures; the item list is left unchanged
    pub async fn refresh(&self) -> Result<UnlockReport> {
        let _slot = self.begin_mutation()?;
        let session = self.active_session()?;

        let snapshot = self.call(self.store.fetch(&self.account)).await?;
        let report = self.apply(&session, &snapshot)?;

        debug!(account = %self.account, decrypted = report.decrypted, "Vault refreshed");
        Ok(report)
    }

    /// Discard the key and all decrypted items.
    ///
    /// Any operation still awaiting the store will fail with
    /// `Error::State` instead of repopulating the session.
    pub fn lock(&self) {
        let mut state = self.lock_state();
        self.generation.fetch_add(1, Ordering::SeqCst);
        let was_unlocked = matches!(*state, SessionState::Unlocked(_));
        *state = SessionState::Locked;
        drop(state);

        if was_unlocked {
            info!(account = %self.account, "Vault locked");
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        // Session updates are single assignments, so a poisoned lock still
        // holds a consistent value.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_unlocking(&self) -> Result<UnlockingGuard<'_>> {
        let mut state = self.lock_state();
        match &*state {
            SessionState::Locked => {}
            SessionState::Unlocking { .. } => {
                return Err(Error::State("Vault is already unlocking".to_string()))
            }
            SessionState::Unlocked(_) => {
                return Err(Error::State("Vault is already unlocked".to_string()))
            }
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *state = SessionState::Unlocking { generation };
        Ok(UnlockingGuard {
            controller: self,
            generation,
            finished: false,
        })
    }

    fn begin_mutation(&self) -> Result<MutationSlot<'_>> {
        if self
            .mutating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::State(
                "Another vault operation is in progress".to_string(),
            ));
        }
        Ok(MutationSlot { flag: &self.mutating })
    }

    fn active_session(&self) -> Result<ActiveSession> {
        match &*self.lock_state() {
            SessionState::Unlocked(session) => Ok(ActiveSession {
                generation: session.generation,
                key: Arc::clone(&session.key),
            }),
            _ => Err(locked_error()),
        }
    }

    fn seal(&self, session: &ActiveSession, draft: &ItemDraft) -> Result<EncryptedItem> {
        let item = draft.to_item(Uuid::new_v4().to_string());
        let payload = codec::encode(&item)?;
        let sealed = encrypt(&session.key, &payload)?;

        Ok(EncryptedItem {
            id: item.id.clone(),
            iv: sealed.iv,
            ciphertext: sealed.ciphertext,
            created_at: Utc::now(),
        })
    }

    /// Replace the item list of `session` with the decryption of `snapshot`.
    fn apply(&self, session: &ActiveSession, snapshot: &VaultSnapshot) -> Result<UnlockReport> {
        let reconciled = reconcile(&session.key, snapshot);

        let mut state = self.lock_state();
        match &mut *state {
            SessionState::Unlocked(current) if current.generation == session.generation => {
                if let Some(meta) = &snapshot.meta {
                    if *meta != current.meta {
                        warn!(account = %self.account, "Store reports different vault metadata");
                    }
                }
                current.items = reconciled.items;
                current.report = reconciled.report;
                Ok(current.report)
            }
            _ => Err(Error::State(
                "Vault was locked while the operation was running".to_string(),
            )),
        }
    }

    async fn call<T, F>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match self.config.store_timeout() {
            Some(limit) => tokio::time::timeout(limit, operation).await.map_err(|_| {
                Error::Store(format!(
                    "{} store did not respond within {}s",
                    self.store.name(),
                    limit.as_secs()
                ))
            })?,
            None => operation.await,
        }
    }
}

fn locked_error() -> Error {
    Error::State("Vault is locked".to_string())
}

/// Marks an unlock in progress. Unless finished, dropping it returns the
/// controller to `Locked`, which covers errors and cancelled futures.
struct UnlockingGuard<'a> {
    controller: &'a VaultController,
    generation: u64,
    finished: bool,
}

impl UnlockingGuard<'_> {
    fn finish(mut self, key: VaultKey, meta: VaultMeta, reconciled: Reconciled) -> Result<()> {
        let controller = self.controller;
        let mut state = controller.lock_state();

        if !state.is_unlocking(self.generation) {
            return Err(Error::State("Vault was locked while unlocking".to_string()));
        }

        let report = reconciled.report;
        *state = SessionState::Unlocked(Session {
            generation: self.generation,
            key: Arc::new(key),
            meta,
            items: reconciled.items,
            report,
        });
        self.finished = true;
        drop(state);

        info!(
            account = %controller.account,
            decrypted = report.decrypted,
            skipped = report.skipped(),
            "Vault unlocked"
        );
        Ok(())
    }
}

impl Drop for UnlockingGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut state = self.controller.lock_state();
        if state.is_unlocking(self.generation) {
            *state = SessionState::Locked;
        }
    }
}

/// Holds the mutation flag until dropped.
struct MutationSlot<'a> {
    flag: &'a AtomicBool,
}

impl Drop for MutationSlot<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
