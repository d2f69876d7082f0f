//! Local filesystem vault store.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::provider::RemoteVaultStore;
use passvault_common::{
    AccountId, EncryptedItem, Error, MalformedItem, Result, VaultMeta, VaultSnapshot,
};

/// On-disk shape of an account document.
///
/// Item records stay raw JSON so that one damaged record neither hides the
/// others nor gets dropped by the next write.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    meta: Option<VaultMeta>,
    #[serde(default)]
    items: Vec<Value>,
}

fn record_id(record: &Value) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

impl Document {
    fn to_snapshot(&self, account: &AccountId) -> VaultSnapshot {
        let mut snapshot = VaultSnapshot {
            meta: self.meta.clone(),
            ..VaultSnapshot::default()
        };

        for record in &self.items {
            match EncryptedItem::deserialize(record) {
                Ok(item) => snapshot.items.push(item),
                Err(e) => match record_id(record) {
                    Some(id) => {
                        warn!(account = %account, item_id = %id, error = %e, "Unreadable item record");
                        snapshot.malformed.push(MalformedItem {
                            id: id.to_string(),
                            reason: e.to_string(),
                        });
                    }
                    None => warn!(account = %account, "Skipping item record without an id"),
                },
            }
        }

        snapshot
    }
}

/// Local filesystem vault store.
///
/// Keeps one JSON document per account at `<root>/<account>.json`.
/// Writes go to a temporary file that is renamed over the document, so a
/// crash never leaves a half-written vault behind.
pub struct LocalStore {
    root: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

fn io_error(context: &str, err: std::io::Error) -> Error {
    Error::Store(format!("{}: {}", context, err))
}

impl LocalStore {
    /// Create a new local store with the given root directory.
    ///
    /// # Postconditions
    /// - Root directory is created if it doesn't exist
    ///
    /// # Errors
    /// - Permission denied or invalid path
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        // Create root if it doesn't exist (sync for constructor)
        if !root.exists() {
            std::fs::create_dir_all(&root)
                .map_err(|e| io_error("Failed to create store root", e))?;
        }

        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, account: &AccountId) -> PathBuf {
        self.root.join(format!("{}.json", account.as_str()))
    }

    async fn load(&self, account: &AccountId) -> Result<Document> {
        let path = self.document_path(account);

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Document::default()),
            Err(e) => return Err(io_error("Failed to read vault document", e)),
        };

        serde_json::from_slice(&bytes)
            .map_err(|e| Error::Store(format!("Corrupt vault document for {}: {}", account, e)))
    }

    async fn save(&self, account: &AccountId, document: &Document) -> Result<()> {
        let path = self.document_path(account);
        let tmp_path = path.with_extension("json.tmp");

        let bytes = serde_json::to_vec_pretty(document)
            .map_err(|e| Error::Serialization(e.to_string()))?;

        fs::write(&tmp_path, &bytes)
            .await
            .map_err(|e| io_error("Failed to write vault document", e))?;
        fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| io_error("Failed to replace vault document", e))?;

        debug!(account = %account, items = document.items.len(), "Saved vault document");
        Ok(())
    }

    async fn modify<F>(&self, account: &AccountId, change: F) -> Result<VaultSnapshot>
    where
        F: FnOnce(&mut Document) + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load(account).await?;
        change(&mut document);
        self.save(account, &document).await?;
        Ok(document.to_snapshot(account))
    }
}

#[async_trait]
impl RemoteVaultStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn get_meta(&self, account: &AccountId) -> Result<Option<VaultMeta>> {
        Ok(self.load(account).await?.meta)
    }

    async fn set_meta(&self, account: &AccountId, meta: VaultMeta) -> Result<VaultMeta> {
        let stored = meta.clone();
        self.modify(account, move |document| document.meta = Some(stored))
            .await?;
        Ok(meta)
    }

    async fn list_items(&self, account: &AccountId) -> Result<Vec<EncryptedItem>> {
        Ok(self.fetch(account).await?.items)
    }

    async fn fetch(&self, account: &AccountId) -> Result<VaultSnapshot> {
        Ok(self.load(account).await?.to_snapshot(account))
    }

    async fn append_item(&self, account: &AccountId, item: EncryptedItem) -> Result<VaultSnapshot> {
        let record =
            serde_json::to_value(&item).map_err(|e| Error::Serialization(e.to_string()))?;
        self.modify(account, move |document| document.items.push(record))
            .await
    }

    async fn remove_item(&self, account: &AccountId, id: &str) -> Result<VaultSnapshot> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load(account).await?;

        let before = document.items.len();
        document.items.retain(|record| record_id(record) != Some(id));
        if document.items.len() != before {
            self.save(account, &document).await?;
        }

        Ok(document.to_snapshot(account))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use passvault_common::{IV_LENGTH, SALT_LENGTH};
    use tempfile::TempDir;

    fn account() -> AccountId {
        AccountId::new("alice@example.com").unwrap()
    }

    fn item(id: &str) -> EncryptedItem {
        EncryptedItem {
            id: id.to_string(),
            iv: [9u8; IV_LENGTH],
            ciphertext: vec![0x55; 40],
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_local_empty_account() {
        let temp = TempDir::new().unwrap();
        let store = LocalStore::new(temp.path()).unwrap();

        assert!(store.get_meta(&account()).await.unwrap().is_none());
        assert!(store.list_items(&account()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_local_persists_across_instances() {
        let temp = TempDir::new().unwrap();
        let meta = VaultMeta::new([4u8; SALT_LENGTH], 5000).unwrap();

        {
            let store = LocalStore::new(temp.path()).unwrap();
            store.set_meta(&account(), meta.clone()).await.unwrap();
            store.append_item(&account(), item("a")).await.unwrap();
            store.append_item(&account(), item("b")).await.unwrap();
        }

        let reopened = LocalStore::new(temp.path()).unwrap();
        assert_eq!(reopened.get_meta(&account()).await.unwrap(), Some(meta));

        let items = reopened.list_items(&account()).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], item_with_time("a", items[0].created_at));
        assert!(!temp.path().join("alice@example.com.json.tmp").exists());
    }

    fn item_with_time(id: &str, created_at: chrono::DateTime<Utc>) -> EncryptedItem {
        EncryptedItem {
            created_at,
            ..item(id)
        }
    }

    #[tokio::test]
    async fn test_local_remove_item() {
        let temp = TempDir::new().unwrap();
        let store = LocalStore::new(temp.path()).unwrap();

        store.append_item(&account(), item("a")).await.unwrap();
        store.append_item(&account(), item("b")).await.unwrap();

        let snapshot = store.remove_item(&account(), "a").await.unwrap();
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.items[0].id, "b");

        let unchanged = store.remove_item(&account(), "missing").await.unwrap();
        assert_eq!(unchanged, snapshot);
    }

    #[tokio::test]
    async fn test_local_corrupt_document_is_store_error() {
        let temp = TempDir::new().unwrap();
        let store = LocalStore::new(temp.path()).unwrap();
        std::fs::write(temp.path().join("alice@example.com.json"), b"{not json").unwrap();

        let result = store.list_items(&account()).await;
        assert!(matches!(result, Err(Error::Store(_))));
    }

    #[tokio::test]
    async fn test_local_damaged_record_keeps_the_rest() {
        let temp = TempDir::new().unwrap();
        let store = LocalStore::new(temp.path()).unwrap();
        for id in ["a", "b", "c"] {
            store.append_item(&account(), item(id)).await.unwrap();
        }

        let path = temp.path().join("alice@example.com.json");
        let mut document: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        document["items"][1]["iv"] = Value::from("AAAA");
        document["items"]
            .as_array_mut()
            .unwrap()
            .push(serde_json::json!({ "ciphertext": "AAAA" }));
        std::fs::write(&path, serde_json::to_vec(&document).unwrap()).unwrap();

        let ids: Vec<_> = store
            .list_items(&account())
            .await
            .unwrap()
            .into_iter()
            .map(|item| item.id)
            .collect();
        assert_eq!(ids, vec!["a", "c"]);

        let snapshot = store.fetch(&account()).await.unwrap();
        assert_eq!(snapshot.malformed.len(), 1);
        assert_eq!(snapshot.malformed[0].id, "b");

        // Later writes keep the damaged record untouched.
        let snapshot = store.append_item(&account(), item("d")).await.unwrap();
        assert_eq!(snapshot.items.len(), 3);
        assert!(snapshot.contains("b"));

        let snapshot = store.remove_item(&account(), "b").await.unwrap();
        assert!(snapshot.malformed.is_empty());
        assert!(!snapshot.contains("b"));
    }

    #[tokio::test]
    async fn test_local_creates_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("nested").join("vaults");

        let store = LocalStore::new(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(store.root(), root.as_path());
    }
}
