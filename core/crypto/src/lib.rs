//! Cryptographic primitives for PassVault.
//!
//! This module provides:
//! - Key derivation using PBKDF2-HMAC-SHA256
//! - Authenticated encryption using AES-256-GCM
//! - Key handling with automatic zeroization
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged
//! - Decryption fails closed with a single generic error

pub mod aead;
pub mod kdf;
pub mod keys;

pub use aead::{decrypt, encrypt, Sealed};
pub use kdf::{derive_key, derive_key_async, KdfParams, DEFAULT_ITERATIONS};
pub use keys::{generate_salt, VaultKey, KEY_LENGTH};
