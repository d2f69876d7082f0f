//! Common utilities and types shared across PassVault modules.
//!
//! This module provides the error type and the encrypted wire records that
//! travel between the vault engine and a remote store. Nothing in here ever
//! holds plaintext or key material.

pub mod encoding;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{
    AccountId, EncryptedItem, MalformedItem, VaultMeta, VaultSnapshot, IV_LENGTH, SALT_LENGTH,
};
