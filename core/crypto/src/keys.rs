//! Key types with secure memory handling.

use rand::{rngs::OsRng, RngCore};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use passvault_common::SALT_LENGTH;

/// Length of encryption keys in bytes (256-bit).
pub const KEY_LENGTH: usize = 32;

/// Symmetric key derived from the master password.
///
/// Lives only in memory for the duration of an unlocked session and is
/// zeroized on drop. Deliberately not `Clone`: share it behind an `Arc`.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct VaultKey {
    key: [u8; KEY_LENGTH],
}

impl VaultKey {
    /// Create a key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VaultKey([REDACTED])")
    }
}

/// Generate a random salt from the OS CSPRNG.
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    let mut salt = [0u8; SALT_LENGTH];
    OsRng.fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_salt_generate() {
        let salt1 = generate_salt();
        let salt2 = generate_salt();

        // Random salts should be different
        assert_ne!(salt1, salt2);
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = VaultKey::from_bytes([0xAB; KEY_LENGTH]);
        let printed = format!("{:?}", key);
        assert_eq!(printed, "VaultKey([REDACTED])");
        assert!(!printed.contains("171"));
    }
}
