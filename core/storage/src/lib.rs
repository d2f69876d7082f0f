//! Remote vault store abstraction for PassVault.
//!
//! This module provides a trait-based interface over the opaque blob store
//! that holds a user's encrypted items, plus a registry for resolving a
//! store by name and configuration.
//!
//! # Design Principles
//! - Stores only ever see ciphertext, nonces and KDF parameters
//! - Async operations: all I/O is async
//! - Mutations return the authoritative post-mutation snapshot
//! - Unified error semantics: every backend failure is `Error::Store`

pub mod http;
pub mod local;
pub mod memory;
pub mod provider;
pub mod registry;

pub use http::HttpStore;
pub use local::LocalStore;
pub use memory::MemoryStore;
pub use provider::RemoteVaultStore;
pub use registry::{create_default_registry, StoreFactory, StoreRegistry};
