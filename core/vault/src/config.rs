//! Controller configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use passvault_common::{Error, Result};
use passvault_crypto::{KdfParams, DEFAULT_ITERATIONS};

/// Default bound on a single store round-trip.
pub const DEFAULT_STORE_TIMEOUT_SECS: u64 = 30;

/// Tunables for a [`VaultController`](crate::VaultController).
///
/// Only `iterations` influences the vault itself, and only at bootstrap:
/// afterwards the iteration count stored in the vault meta is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerConfig {
    /// PBKDF2 iterations for newly bootstrapped vaults.
    pub iterations: u32,
    /// Upper bound on each store call, in seconds. `None` waits forever.
    pub store_timeout_secs: Option<u64>,
}

impl ControllerConfig {
    /// Use `iterations` for new vaults.
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    /// Bound store calls by `timeout`, or not at all.
    pub fn with_store_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.store_timeout_secs = timeout.map(|t| t.as_secs().max(1));
        self
    }

    /// KDF parameters for new vaults.
    pub fn kdf_params(&self) -> KdfParams {
        KdfParams::new(self.iterations)
    }

    /// Store timeout as a `Duration`.
    pub fn store_timeout(&self) -> Option<Duration> {
        self.store_timeout_secs.map(Duration::from_secs)
    }

    /// Check the configuration is usable.
    ///
    /// # Errors
    /// - Zero iterations
    /// - Zero-second store timeout
    pub fn validate(&self) -> Result<()> {
        self.kdf_params().validate()?;
        if self.store_timeout_secs == Some(0) {
            return Err(Error::InvalidInput(
                "Store timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }

    /// Serialize configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let config: Self =
            serde_json::from_slice(bytes).map_err(|e| Error::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            store_timeout_secs: Some(DEFAULT_STORE_TIMEOUT_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.iterations, 200_000);
        assert_eq!(config.store_timeout(), Some(Duration::from_secs(30)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = ControllerConfig::default()
            .with_iterations(1000)
            .with_store_timeout(None);

        let json = config.to_json().unwrap();
        assert_eq!(ControllerConfig::from_json(&json).unwrap(), config);

        let bytes = config.to_bytes().unwrap();
        assert_eq!(ControllerConfig::from_bytes(&bytes).unwrap(), config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ControllerConfig::from_json(r#"{ "iterations": 5000 }"#).unwrap();
        assert_eq!(config.iterations, 5000);
        assert_eq!(config.store_timeout_secs, Some(DEFAULT_STORE_TIMEOUT_SECS));
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(ControllerConfig::from_json(r#"{ "iterations": 0 }"#).is_err());
        assert!(ControllerConfig::from_json(r#"{ "store_timeout_secs": 0 }"#).is_err());
        assert!(ControllerConfig::from_json(r#"{ "iterationz": 5 }"#).is_err());
    }
}
