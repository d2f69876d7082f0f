//! Store registry for resolving a vault store by name.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::provider::RemoteVaultStore;
use passvault_common::{Error, Result};

/// Factory function type for creating stores.
pub type StoreFactory = Box<dyn Fn(Value) -> Result<Arc<dyn RemoteVaultStore>> + Send + Sync>;

/// Registry for vault store factories.
///
/// Allows dynamic registration and resolution of stores by name and
/// JSON configuration.
pub struct StoreRegistry {
    factories: HashMap<String, StoreFactory>,
}

impl StoreRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a store factory.
    ///
    /// # Errors
    /// - Returns error if name is already registered
    pub fn register(&mut self, name: impl Into<String>, factory: StoreFactory) -> Result<()> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(Error::AlreadyExists(format!(
                "Store '{}' is already registered",
                name
            )));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Resolve a store by name and configuration.
    ///
    /// # Errors
    /// - Store not found
    /// - Configuration invalid
    pub fn resolve(&self, name: &str, config: Value) -> Result<Arc<dyn RemoteVaultStore>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("Store '{}' is not registered", name)))?;
        factory(config)
    }

    /// Get list of registered store names, sorted.
    pub fn stores(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn required_str<'a>(config: &'a Value, store: &str, field: &str) -> Result<&'a str> {
    config.get(field).and_then(|v| v.as_str()).ok_or_else(|| {
        Error::InvalidInput(format!("{} store requires '{}'", store, field))
    })
}

fn memory_store(_config: Value) -> Result<Arc<dyn RemoteVaultStore>> {
    Ok(Arc::new(crate::memory::MemoryStore::new()))
}

fn local_store(config: Value) -> Result<Arc<dyn RemoteVaultStore>> {
    let root = required_str(&config, "local", "root")?;
    Ok(Arc::new(crate::local::LocalStore::new(root)?))
}

fn http_store(config: Value) -> Result<Arc<dyn RemoteVaultStore>> {
    let base_url = required_str(&config, "http", "base_url")?;
    let token = required_str(&config, "http", "token")?;
    Ok(Arc::new(crate::http::HttpStore::new(base_url, token)?))
}

/// Create a registry with the built-in stores.
///
/// - `memory`: no configuration
/// - `local`: `{"root": "<dir>"}`
/// - `http`: `{"base_url": "<url>", "token": "<session token>"}`
pub fn create_default_registry() -> StoreRegistry {
    let mut factories: HashMap<String, StoreFactory> = HashMap::new();
    factories.insert("memory".to_string(), Box::new(memory_store));
    factories.insert("local".to_string(), Box::new(local_store));
    factories.insert("http".to_string(), Box::new(http_store));

    StoreRegistry { factories }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_resolve() {
        let mut registry = StoreRegistry::new();

        registry
            .register("test", Box::new(memory_store))
            .unwrap();

        let store = registry.resolve("test", Value::Null).unwrap();
        assert_eq!(store.name(), "memory");
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = StoreRegistry::new();

        registry
            .register("test", Box::new(memory_store))
            .unwrap();

        let result = registry.register("test", Box::new(memory_store));
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_unknown_fails() {
        let registry = StoreRegistry::new();
        assert!(registry.resolve("unknown", Value::Null).is_err());
    }

    #[test]
    fn test_default_registry() {
        let registry = create_default_registry();
        assert_eq!(registry.stores(), vec!["http", "local", "memory"]);

        let temp = tempfile::TempDir::new().unwrap();
        let local = registry
            .resolve("local", serde_json::json!({ "root": temp.path() }))
            .unwrap();
        assert_eq!(local.name(), "local");

        assert!(registry.resolve("local", Value::Null).is_err());
        assert!(registry
            .resolve("http", serde_json::json!({ "base_url": "https://vault.example" }))
            .is_err());
    }
}
