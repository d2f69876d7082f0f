//! Common types used throughout PassVault.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::encoding::{base64_array, base64_vec};

/// Length of the key-derivation salt in bytes.
pub const SALT_LENGTH: usize = 16;

/// Length of the AEAD nonce in bytes (96-bit).
pub const IV_LENGTH: usize = 12;

/// Maximum accepted length of an account identifier.
const MAX_ACCOUNT_LEN: usize = 256;

/// Identifier of the account a vault belongs to.
///
/// Stores use it as a key (and `LocalStore` as a file name), so it is
/// restricted to strings that cannot address anything outside the account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create a new AccountId from a string.
    ///
    /// # Errors
    /// - Returns error if id is empty, too long, `.`/`..`, or contains
    ///   path separators or control characters
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(crate::Error::InvalidInput(
                "AccountId cannot be empty".to_string(),
            ));
        }
        if id.len() > MAX_ACCOUNT_LEN {
            return Err(crate::Error::InvalidInput(format!(
                "AccountId longer than {} bytes",
                MAX_ACCOUNT_LEN
            )));
        }
        if id == "." || id == ".." {
            return Err(crate::Error::InvalidInput(
                "AccountId cannot be a relative path".to_string(),
            ));
        }
        if id
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_control())
        {
            return Err(crate::Error::InvalidInput(
                "AccountId cannot contain separators or control characters".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key-derivation parameters of a vault.
///
/// Created once at bootstrap and mirrored to the store, which is the source
/// of truth for them afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultMeta {
    /// Random salt for PBKDF2.
    #[serde(with = "base64_array")]
    pub salt: [u8; SALT_LENGTH],
    /// PBKDF2 iteration count.
    pub iterations: u32,
}

impl VaultMeta {
    /// Create metadata from a salt and iteration count.
    ///
    /// # Errors
    /// - Returns error if `iterations` is zero
    pub fn new(salt: [u8; SALT_LENGTH], iterations: u32) -> crate::Result<Self> {
        let meta = Self { salt, iterations };
        meta.validate()?;
        Ok(meta)
    }

    /// Check that metadata received from a store is usable.
    pub fn validate(&self) -> crate::Result<()> {
        if self.iterations == 0 {
            return Err(crate::Error::InvalidInput(
                "Vault iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// One encrypted vault entry as held by the store.
///
/// Never mutated in place; the store only appends and removes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedItem {
    /// Client-assigned id, unique per account.
    pub id: String,
    /// Nonce used for this item's encryption.
    #[serde(with = "base64_array")]
    pub iv: [u8; IV_LENGTH],
    /// Ciphertext including the authentication tag.
    #[serde(with = "base64_vec")]
    pub ciphertext: Vec<u8>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// A stored record that carries an id but could not be read as an
/// [`EncryptedItem`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MalformedItem {
    pub id: String,
    pub reason: String,
}

/// Authoritative post-mutation state of an account.
///
/// Items are in append order, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSnapshot {
    /// Current vault metadata, if the vault has been bootstrapped.
    pub meta: Option<VaultMeta>,
    /// Canonical list of encrypted items.
    pub items: Vec<EncryptedItem>,
    /// Records the store holds but could not parse.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub malformed: Vec<MalformedItem>,
}

impl VaultSnapshot {
    /// Whether an item with `id` is part of this snapshot.
    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|item| item.id == id)
            || self.malformed.iter().any(|record| record.id == id)
    }
}
