//! Tolerant decryption of a store snapshot.
//!
//! Every encrypted item is decrypted on its own. Items that fail, and records
//! the store could not parse, are counted in an [`UnlockReport`] and logged
//! by id. The rest are kept.

use serde::Serialize;
use tracing::{error, warn};

use crate::codec;
use crate::item::VaultItem;
use passvault_common::{EncryptedItem, Error, Result, VaultSnapshot};
use passvault_crypto::{decrypt, VaultKey};

/// Outcome of decrypting a store snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnlockStatus {
    /// Every item decrypted.
    Unlocked,
    /// Some items decrypted, some were skipped.
    Partial,
    /// The store holds no items.
    Empty,
    /// The store holds items and none of them decrypted.
    LikelyWrongPassword,
}

/// Counts gathered while decrypting a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UnlockReport {
    /// Items in the snapshot.
    pub total: usize,
    /// Items that decrypted and decoded.
    pub decrypted: usize,
    /// Items rejected by the AEAD tag check.
    pub skipped_auth: usize,
    /// Items that were not valid vault items, before or after decryption.
    pub skipped_format: usize,
}

impl UnlockReport {
    /// Items that were left out of the list.
    pub fn skipped(&self) -> usize {
        self.skipped_auth + self.skipped_format
    }

    /// At least one item exists and none decrypted.
    pub fn likely_wrong_password(&self) -> bool {
        self.total > 0 && self.decrypted == 0
    }

    /// Classify this report.
    pub fn status(&self) -> UnlockStatus {
        if self.total == 0 {
            UnlockStatus::Empty
        } else if self.decrypted == 0 {
            UnlockStatus::LikelyWrongPassword
        } else if self.skipped() > 0 {
            UnlockStatus::Partial
        } else {
            UnlockStatus::Unlocked
        }
    }
}

/// Decrypted items together with the report that produced them.
#[derive(Debug, Clone, Default)]
pub struct Reconciled {
    /// Items, most recently added first.
    pub items: Vec<VaultItem>,
    pub report: UnlockReport,
}

/// Decrypt and decode a single encrypted item.
///
/// # Errors
/// - `Error::Authentication` if the key, iv or ciphertext don't match
/// - `Error::Format` if the plaintext is not a valid item, or its id differs
///   from the envelope's
pub fn decrypt_item(key: &VaultKey, encrypted: &EncryptedItem) -> Result<VaultItem> {
    let plaintext = decrypt(key, &encrypted.iv, &encrypted.ciphertext)?;
    let item = codec::decode(&plaintext)?;

    if item.id != encrypted.id {
        return Err(Error::Format("item id does not match its envelope".to_string()));
    }
    Ok(item)
}

/// Decrypt every item of a canonical (append-ordered) snapshot.
///
/// Never fails as a whole: per-item failures are counted in the report.
pub fn reconcile(key: &VaultKey, snapshot: &VaultSnapshot) -> Reconciled {
    let results: Vec<(&str, Result<VaultItem>)> = snapshot
        .items
        .iter()
        .rev()
        .map(|item| (item.id.as_str(), decrypt_item(key, item)))
        .collect();

    let mut reconciled = Reconciled {
        items: Vec::with_capacity(results.len()),
        report: UnlockReport {
            total: results.len() + snapshot.malformed.len(),
            skipped_format: snapshot.malformed.len(),
            ..UnlockReport::default()
        },
    };

    for record in &snapshot.malformed {
        error!(item_id = %record.id, reason = %record.reason, "Skipping unparseable item");
    }

    for (id, result) in results {
        match result {
            Ok(item) => {
                reconciled.report.decrypted += 1;
                reconciled.items.push(item);
            }
            Err(Error::Authentication) => {
                reconciled.report.skipped_auth += 1;
                warn!(item_id = %id, "Skipping item that failed authentication");
            }
            Err(e) => {
                reconciled.report.skipped_format += 1;
                error!(item_id = %id, error = %e, "Skipping undecodable item");
            }
        }
    }

    reconciled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemDraft;
    use chrono::Utc;
    use passvault_common::MalformedItem;
    use passvault_crypto::encrypt;

    fn key(byte: u8) -> VaultKey {
        VaultKey::from_bytes([byte; 32])
    }

    fn seal(key: &VaultKey, id: &str, title: &str) -> EncryptedItem {
        let item = ItemDraft::new(title, "user", "pw").to_item(id);
        seal_bytes(key, id, &codec::encode(&item).unwrap())
    }

    fn snapshot(items: Vec<EncryptedItem>) -> VaultSnapshot {
        VaultSnapshot {
            items,
            ..VaultSnapshot::default()
        }
    }

    fn seal_bytes(key: &VaultKey, id: &str, plaintext: &[u8]) -> EncryptedItem {
        let sealed = encrypt(key, plaintext).unwrap();
        EncryptedItem {
            id: id.to_string(),
            iv: sealed.iv,
            ciphertext: sealed.ciphertext,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_reconcile_orders_newest_first() {
        let k = key(1);
        let list = snapshot(vec![seal(&k, "a", "first"), seal(&k, "b", "second")]);

        let reconciled = reconcile(&k, &list);
        let titles: Vec<_> = reconciled.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["second", "first"]);
        assert_eq!(reconciled.report.status(), UnlockStatus::Unlocked);
    }

    #[test]
    fn test_reconcile_skips_foreign_items() {
        let mine = key(1);
        let theirs = key(2);
        let list = snapshot(vec![
            seal(&mine, "a", "one"),
            seal(&theirs, "b", "two"),
            seal(&mine, "c", "three"),
            seal(&theirs, "d", "four"),
        ]);

        let reconciled = reconcile(&mine, &list);
        assert_eq!(reconciled.items.len(), 2);
        assert_eq!(
            reconciled.report,
            UnlockReport {
                total: 4,
                decrypted: 2,
                skipped_auth: 2,
                skipped_format: 0,
            }
        );
        assert_eq!(reconciled.report.status(), UnlockStatus::Partial);
    }

    #[test]
    fn test_reconcile_counts_format_failures() {
        let k = key(1);
        // Payload is valid but claims a different id.
        let mut moved = seal(&k, "c", "moved");
        moved.id = "d".to_string();
        let list = snapshot(vec![
            seal_bytes(&k, "a", b"not json"),
            seal(&k, "b", "good"),
            moved,
        ]);

        let reconciled = reconcile(&k, &list);
        assert_eq!(reconciled.report.decrypted, 1);
        assert_eq!(reconciled.report.skipped_format, 2);
        assert_eq!(reconciled.items[0].id, "b");
    }

    #[test]
    fn test_reconcile_counts_unparseable_records() {
        let k = key(1);
        let mut list = snapshot(vec![seal(&k, "a", "one"), seal(&k, "c", "three")]);
        list.malformed.push(MalformedItem {
            id: "b".to_string(),
            reason: "invalid iv".to_string(),
        });

        let reconciled = reconcile(&k, &list);
        assert_eq!(
            reconciled.report,
            UnlockReport {
                total: 3,
                decrypted: 2,
                skipped_auth: 0,
                skipped_format: 1,
            }
        );
        assert_eq!(reconciled.report.status(), UnlockStatus::Partial);

        // Only unparseable records still means nothing could be read.
        let broken = VaultSnapshot {
            malformed: list.malformed.clone(),
            ..VaultSnapshot::default()
        };
        assert_eq!(
            reconcile(&k, &broken).report.status(),
            UnlockStatus::LikelyWrongPassword
        );
    }

    #[test]
    fn test_wrong_key_is_likely_wrong_password() {
        let list = snapshot(vec![seal(&key(1), "a", "one"), seal(&key(1), "b", "two")]);

        let report = reconcile(&key(9), &list).report;
        assert!(report.likely_wrong_password());
        assert_eq!(report.status(), UnlockStatus::LikelyWrongPassword);
        assert_eq!(report.skipped(), 2);
    }

    #[test]
    fn test_empty_snapshot() {
        let reconciled = reconcile(&key(1), &VaultSnapshot::default());
        assert!(reconciled.items.is_empty());
        assert!(!reconciled.report.likely_wrong_password());
        assert_eq!(reconciled.report.status(), UnlockStatus::Empty);
    }
}
