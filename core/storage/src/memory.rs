//! In-memory vault store for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::provider::RemoteVaultStore;
use passvault_common::{AccountId, EncryptedItem, Error, Result, VaultMeta, VaultSnapshot};

/// In-memory vault store.
///
/// Useful for testing and development. All data is stored in memory
/// and lost on drop. An outage can be simulated with
/// [`MemoryStore::set_available`].
pub struct MemoryStore {
    accounts: RwLock<HashMap<AccountId, VaultSnapshot>>,
    available: AtomicBool,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Make every subsequent call succeed (`true`) or fail with
    /// `Error::Store` (`false`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Current snapshot of an account, bypassing availability.
    pub fn snapshot(&self, account: &AccountId) -> Result<VaultSnapshot> {
        Ok(self.read()?.get(account).cloned().unwrap_or_default())
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::Store("memory store is unavailable".to_string()))
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<AccountId, VaultSnapshot>>> {
        self.accounts
            .read()
            .map_err(|_| Error::Store("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<AccountId, VaultSnapshot>>> {
        self.accounts
            .write()
            .map_err(|_| Error::Store("memory store lock poisoned".to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteVaultStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get_meta(&self, account: &AccountId) -> Result<Option<VaultMeta>> {
        self.check_available()?;
        Ok(self.read()?.get(account).and_then(|record| record.meta.clone()))
    }

    async fn set_meta(&self, account: &AccountId, meta: VaultMeta) -> Result<VaultMeta> {
        self.check_available()?;
        let mut accounts = self.write()?;
        let record = accounts.entry(account.clone()).or_default();
        record.meta = Some(meta.clone());
        Ok(meta)
    }

    async fn list_items(&self, account: &AccountId) -> Result<Vec<EncryptedItem>> {
        self.check_available()?;
        Ok(self
            .read()?
            .get(account)
            .map(|record| record.items.clone())
            .unwrap_or_default())
    }

    async fn fetch(&self, account: &AccountId) -> Result<VaultSnapshot> {
        self.check_available()?;
        self.snapshot(account)
    }

    async fn append_item(&self, account: &AccountId, item: EncryptedItem) -> Result<VaultSnapshot> {
        self.check_available()?;
        let mut accounts = self.write()?;
        let record = accounts.entry(account.clone()).or_default();
        record.items.push(item);
        Ok(record.clone())
    }

    async fn remove_item(&self, account: &AccountId, id: &str) -> Result<VaultSnapshot> {
        self.check_available()?;
        let mut accounts = self.write()?;
        match accounts.get_mut(account) {
            Some(record) => {
                record.items.retain(|item| item.id != id);
                Ok(record.clone())
            }
            None => Ok(VaultSnapshot::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use passvault_common::{IV_LENGTH, SALT_LENGTH};

    fn account() -> AccountId {
        AccountId::new("alice").unwrap()
    }

    fn item(id: &str) -> EncryptedItem {
        EncryptedItem {
            id: id.to_string(),
            iv: [1u8; IV_LENGTH],
            ciphertext: vec![0xAA; 32],
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_meta_absent_then_set() {
        let store = MemoryStore::new();
        assert!(store.get_meta(&account()).await.unwrap().is_none());

        let meta = VaultMeta::new([3u8; SALT_LENGTH], 1000).unwrap();
        store.set_meta(&account(), meta.clone()).await.unwrap();
        store.set_meta(&account(), meta.clone()).await.unwrap();

        assert_eq!(store.get_meta(&account()).await.unwrap(), Some(meta));
    }

    #[tokio::test]
    async fn test_append_returns_canonical_list() {
        let store = MemoryStore::new();
        store.append_item(&account(), item("a")).await.unwrap();
        let snapshot = store.append_item(&account(), item("b")).await.unwrap();

        let ids: Vec<_> = snapshot.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(store.list_items(&account()).await.unwrap(), snapshot.items);
    }

    #[tokio::test]
    async fn test_fetch_reads_meta_and_items() {
        let store = MemoryStore::new();
        let meta = VaultMeta::new([3u8; SALT_LENGTH], 1000).unwrap();
        store.set_meta(&account(), meta.clone()).await.unwrap();
        store.append_item(&account(), item("a")).await.unwrap();

        let snapshot = store.fetch(&account()).await.unwrap();
        assert_eq!(snapshot.meta, Some(meta));
        assert_eq!(snapshot.items, store.list_items(&account()).await.unwrap());
        assert!(snapshot.malformed.is_empty());

        store.set_available(false);
        assert!(matches!(store.fetch(&account()).await, Err(Error::Store(_))));
    }

    #[tokio::test]
    async fn test_remove_item() {
        let store = MemoryStore::new();
        store.append_item(&account(), item("a")).await.unwrap();
        store.append_item(&account(), item("b")).await.unwrap();

        let snapshot = store.remove_item(&account(), "a").await.unwrap();
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.items[0].id, "b");

        // Unknown id is a no-op
        let again = store.remove_item(&account(), "a").await.unwrap();
        assert_eq!(again, snapshot);
    }

    #[tokio::test]
    async fn test_accounts_are_isolated() {
        let store = MemoryStore::new();
        let bob = AccountId::new("bob").unwrap();
        store.append_item(&account(), item("a")).await.unwrap();

        assert!(store.list_items(&bob).await.unwrap().is_empty());
        assert!(store.remove_item(&bob, "a").await.unwrap().items.is_empty());
        assert_eq!(store.list_items(&account()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails() {
        let store = MemoryStore::new();
        store.set_available(false);

        let result = store.append_item(&account(), item("a")).await;
        assert!(matches!(result, Err(Error::Store(_))));
        assert!(store.snapshot(&account()).unwrap().items.is_empty());

        store.set_available(true);
        assert!(store.append_item(&account(), item("a")).await.is_ok());
    }
}
