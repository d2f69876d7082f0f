//! Remote vault store trait definition.

use async_trait::async_trait;

use passvault_common::{AccountId, EncryptedItem, Result, VaultMeta, VaultSnapshot};

/// Opaque, account-scoped store of encrypted vault items.
///
/// Callers are assumed to be authenticated already. Implementations never
/// receive plaintext or key material and must not try to interpret
/// ciphertext.
#[async_trait]
pub trait RemoteVaultStore: Send + Sync {
    /// Get the store name (e.g., "memory", "local", "http").
    fn name(&self) -> &str;

    /// Fetch the vault metadata, `None` if the account was never bootstrapped.
    async fn get_meta(&self, account: &AccountId) -> Result<Option<VaultMeta>>;

    /// Insert or replace the vault metadata.
    ///
    /// # Postconditions
    /// - Returns the metadata now held by the store
    /// - Repeating the call with the same value changes nothing
    async fn set_meta(&self, account: &AccountId, meta: VaultMeta) -> Result<VaultMeta>;

    /// List encrypted items in append order, oldest first.
    ///
    /// Records that cannot be parsed are left out.
    async fn list_items(&self, account: &AccountId) -> Result<Vec<EncryptedItem>>;

    /// Read meta and items in one call.
    ///
    /// # Postconditions
    /// - `items` matches what `list_items` would return
    /// - Unparseable records that carry an id are reported in `malformed`
    async fn fetch(&self, account: &AccountId) -> Result<VaultSnapshot>;

    /// Append an encrypted item.
    ///
    /// # Postconditions
    /// - Returns the canonical post-append snapshot
    ///
    /// # Notes
    /// - Id uniqueness is the caller's responsibility
    async fn append_item(&self, account: &AccountId, item: EncryptedItem) -> Result<VaultSnapshot>;

    /// Remove every item with `id`.
    ///
    /// # Postconditions
    /// - Returns the canonical post-removal snapshot
    /// - Removing an unknown id succeeds and returns the unchanged snapshot
    async fn remove_item(&self, account: &AccountId, id: &str) -> Result<VaultSnapshot>;
}
