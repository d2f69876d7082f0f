//! Authenticated encryption using AES-256-GCM.
//!
//! Every call to [`encrypt`] draws a fresh 96-bit nonce from the OS CSPRNG.
//! The nonce travels next to the ciphertext (not inside it) because the
//! remote store keeps `iv` and `ciphertext` as separate fields.
//!
//! Layout of [`Sealed::ciphertext`]:
//!   [ encrypted data | 16-byte auth tag ]

use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm,
};
use zeroize::Zeroizing;

use crate::keys::VaultKey;
use passvault_common::{Error, Result, IV_LENGTH};

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

/// Output of a single encryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    /// Random nonce used for this encryption.
    pub iv: [u8; IV_LENGTH],
    /// Ciphertext followed by the authentication tag.
    pub ciphertext: Vec<u8>,
}

/// Encrypt plaintext using AES-256-GCM.
///
/// # Postconditions
/// - The nonce is freshly generated, never derived from a counter
/// - `ciphertext.len() == plaintext.len() + TAG_SIZE`
///
/// # Errors
/// - Returns error if the cipher rejects the input (oversized plaintext)
pub fn encrypt(key: &VaultKey, plaintext: &[u8]) -> Result<Sealed> {
    let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| Error::Crypto("Encryption failed".to_string()))?;

    let mut iv = [0u8; IV_LENGTH];
    iv.copy_from_slice(&nonce);

    Ok(Sealed { iv, ciphertext })
}

/// Decrypt ciphertext using AES-256-GCM.
///
/// # Errors
/// - [`Error::Authentication`] for any tag mismatch: wrong key, wrong iv,
///   truncated or tampered ciphertext. The cause is never distinguished.
///
/// # Security
/// - Tag comparison is constant-time inside `aes-gcm`
/// - No partial plaintext is ever returned
pub fn decrypt(key: &VaultKey, iv: &[u8; IV_LENGTH], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()));

    cipher
        .decrypt(GenericArray::from_slice(iv), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| Error::Authentication)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KEY_LENGTH;
    use proptest::prelude::*;

    fn key(byte: u8) -> VaultKey {
        VaultKey::from_bytes([byte; KEY_LENGTH])
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = key(42);
        let plaintext = b"Hello, World!";

        let sealed = encrypt(&key, plaintext).unwrap();
        let decrypted = decrypt(&key, &sealed.iv, &sealed.ciphertext).unwrap();

        assert_eq!(decrypted.as_slice(), plaintext);
    }

    #[test]
    fn test_ciphertext_size() {
        let key = key(42);
        let plaintext = b"Test message";

        let sealed = encrypt(&key, plaintext).unwrap();

        assert_eq!(sealed.ciphertext.len(), plaintext.len() + TAG_SIZE);
    }

    #[test]
    fn test_different_nonce_each_time() {
        let key = key(42);
        let plaintext = b"Same plaintext";

        let first = encrypt(&key, plaintext).unwrap();
        let second = encrypt(&key, plaintext).unwrap();

        assert_ne!(first.iv, second.iv);
        assert_ne!(first.ciphertext, second.ciphertext);
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = encrypt(&key(1), b"Secret data").unwrap();
        let result = decrypt(&key(2), &sealed.iv, &sealed.ciphertext);

        assert!(matches!(result, Err(Error::Authentication)));
    }

    #[test]
    fn test_truncated_ciphertext_fails() {
        let key = key(42);
        let sealed = encrypt(&key, b"Important data").unwrap();

        let result = decrypt(&key, &sealed.iv, &sealed.ciphertext[..TAG_SIZE - 1]);
        assert!(matches!(result, Err(Error::Authentication)));

        let result = decrypt(&key, &sealed.iv, &[]);
        assert!(matches!(result, Err(Error::Authentication)));
    }

    #[test]
    fn test_empty_plaintext() {
        let key = key(42);

        let sealed = encrypt(&key, b"").unwrap();
        let decrypted = decrypt(&key, &sealed.iv, &sealed.ciphertext).unwrap();

        assert!(decrypted.is_empty());
    }

    proptest! {
        #[test]
        fn prop_roundtrip(
            key_bytes in any::<[u8; KEY_LENGTH]>(),
            plaintext in proptest::collection::vec(any::<u8>(), 0..512),
        ) {
            let key = VaultKey::from_bytes(key_bytes);
            let sealed = encrypt(&key, &plaintext).unwrap();
            let decrypted = decrypt(&key, &sealed.iv, &sealed.ciphertext).unwrap();
            prop_assert_eq!(decrypted.as_slice(), plaintext.as_slice());
        }

        #[test]
        fn prop_ciphertext_bit_flip_is_rejected(
            plaintext in proptest::collection::vec(any::<u8>(), 0..256),
            index in any::<proptest::sample::Index>(),
            bit in 0u8..8,
        ) {
            let key = key(7);
            let mut sealed = encrypt(&key, &plaintext).unwrap();
            let position = index.index(sealed.ciphertext.len());
            sealed.ciphertext[position] ^= 1 << bit;

            let result = decrypt(&key, &sealed.iv, &sealed.ciphertext);
            prop_assert!(matches!(result, Err(Error::Authentication)));
        }

        #[test]
        fn prop_iv_bit_flip_is_rejected(
            plaintext in proptest::collection::vec(any::<u8>(), 0..256),
            position in 0usize..IV_LENGTH,
            bit in 0u8..8,
        ) {
            let key = key(7);
            let mut sealed = encrypt(&key, &plaintext).unwrap();
            sealed.iv[position] ^= 1 << bit;

            let result = decrypt(&key, &sealed.iv, &sealed.ciphertext);
            prop_assert!(matches!(result, Err(Error::Authentication)));
        }
    }
}
