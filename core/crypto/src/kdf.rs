//! Key derivation using PBKDF2-HMAC-SHA256.
//!
//! Deliberately slow. Async callers should go through [`derive_key_async`],
//! which moves the work onto the blocking thread pool.

use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use crate::keys::{VaultKey, KEY_LENGTH};
use passvault_common::{Error, Result, SALT_LENGTH};

/// Iteration count used for new vaults.
pub const DEFAULT_ITERATIONS: u32 = 200_000;

/// Parameters for PBKDF2 key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Number of PBKDF2 rounds.
    pub iterations: u32,
}

impl KdfParams {
    /// Create parameters with an explicit iteration count.
    pub fn new(iterations: u32) -> Self {
        Self { iterations }
    }

    /// Reject parameters PBKDF2 cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(Error::InvalidInput(
                "KDF iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::new(DEFAULT_ITERATIONS)
    }
}

/// Derive a vault key from a password and salt.
///
/// # Postconditions
/// - The derived key is deterministic given the same inputs
///
/// # Errors
/// - Returns error if `iterations` is zero
///
/// # Security
/// - Password is not stored or logged
/// - Intermediate key buffer is zeroized
pub fn derive_key(password: &[u8], salt: &[u8; SALT_LENGTH], iterations: u32) -> Result<VaultKey> {
    KdfParams::new(iterations).validate()?;

    let mut key_bytes = [0u8; KEY_LENGTH];
    pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut key_bytes);

    let key = VaultKey::from_bytes(key_bytes);
    key_bytes.zeroize();
    Ok(key)
}

/// Derive a vault key without blocking the async executor.
///
/// The derivation runs to completion on the blocking pool even if the
/// returned future is dropped; the key is then discarded (and zeroized)
/// with the task output, so a half-derived key can never be observed.
pub async fn derive_key_async(
    password: &[u8],
    salt: [u8; SALT_LENGTH],
    iterations: u32,
) -> Result<VaultKey> {
    let password = Zeroizing::new(password.to_vec());

    tokio::task::spawn_blocking(move || derive_key(&password, &salt, iterations))
        .await
        .map_err(|e| Error::Crypto(format!("Key derivation task failed: {}", e)))?
}
