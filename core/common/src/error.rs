//! Common error types for PassVault.

use thiserror::Error;

/// Top-level error type for PassVault operations.
///
/// Variants never carry key material, passwords or decrypted item content.
#[derive(Debug, Error)]
pub enum Error {
    /// AEAD tag mismatch: wrong key, wrong iv or tampered ciphertext.
    #[error("Authentication failed")]
    Authentication,

    /// Payload decrypted but is not a well-formed vault item.
    #[error("Malformed vault item: {0}")]
    Format(String),

    /// Remote store or network failure.
    #[error("Store error: {0}")]
    Store(String),

    /// Operation invoked in the wrong controller state.
    #[error("Invalid state: {0}")]
    State(String),

    /// Cryptographic primitive could not run.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_message_is_generic() {
        assert_eq!(Error::Authentication.to_string(), "Authentication failed");
    }
}
