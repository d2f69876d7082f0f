//! Plaintext vault items.
//!
//! These types only ever exist in the memory of an unlocked client. Secret
//! fields are wiped on drop and left out of `Debug` output.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use passvault_common::{Error, Result};

/// A decrypted vault entry.
///
/// Field order is fixed so the JSON encoding is deterministic.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(deny_unknown_fields)]
pub struct VaultItem {
    /// Id shared with the item's encrypted envelope.
    pub id: String,
    pub title: String,
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl fmt::Debug for VaultItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultItem")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("url", &self.url)
            .field("notes", &self.notes.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Caller-supplied content for a new item. The controller assigns the id.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ItemDraft {
    pub title: String,
    pub username: String,
    pub password: String,
    pub url: Option<String>,
    pub notes: Option<String>,
}

impl ItemDraft {
    /// Create a draft with the required fields.
    pub fn new(
        title: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            username: username.into(),
            password: password.into(),
            url: None,
            notes: None,
        }
    }

    /// Set the URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set free-form notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Reject drafts that cannot become an item.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidInput("Item title cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Build the plaintext item stored under `id`.
    pub fn to_item(&self, id: impl Into<String>) -> VaultItem {
        VaultItem {
            id: id.into(),
            title: self.title.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            url: self.url.clone(),
            notes: self.notes.clone(),
        }
    }
}

impl From<&VaultItem> for ItemDraft {
    fn from(item: &VaultItem) -> Self {
        Self {
            title: item.title.clone(),
            username: item.username.clone(),
            password: item.password.clone(),
            url: item.url.clone(),
            notes: item.notes.clone(),
        }
    }
}

impl fmt::Debug for ItemDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemDraft")
            .field("title", &self.title)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}
