//! Vault engine for PassVault.
//!
//! This module provides:
//! - Plaintext item model and its deterministic encoding
//! - Tolerant decryption of store snapshots
//! - The vault controller: bootstrap, unlock, lock and item mutations
//! - Random password generation
//!
//! # Architecture
//! The controller sits between the user interface and a remote vault store.
//! Everything it hands to the store is encrypted per item; the store never
//! sees a password, key or plaintext field.

pub mod codec;
pub mod config;
pub mod controller;
pub mod generator;
pub mod item;
pub mod reconcile;

pub use config::ControllerConfig;
pub use controller::{VaultController, VaultState};
pub use generator::{generate, GeneratorOptions};
pub use item::{ItemDraft, VaultItem};
pub use reconcile::{decrypt_item, reconcile, Reconciled, UnlockReport, UnlockStatus};
