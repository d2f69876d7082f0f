//! Base64 serde adapters for binary fields in JSON records.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{de, Deserialize, Deserializer, Serializer};

/// Encode bytes with the standard base64 alphabet.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a standard base64 string.
pub fn decode(text: &str) -> crate::Result<Vec<u8>> {
    STANDARD
        .decode(text)
        .map_err(|e| crate::Error::Serialization(format!("invalid base64: {}", e)))
}

/// Decode a standard base64 string into a fixed-size array.
pub fn decode_array<const N: usize>(text: &str) -> crate::Result<[u8; N]> {
    let bytes = decode(text)?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| {
        crate::Error::Serialization(format!("expected {} bytes, got {}", N, len))
    })
}

/// `#[serde(with = "...")]` adapter for `Vec<u8>`.
pub mod base64_vec {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        decode(&text).map_err(de::Error::custom)
    }
}

/// `#[serde(with = "...")]` adapter for `[u8; N]`.
pub mod base64_array {
    use super::*;

    pub fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let text = String::deserialize(deserializer)?;
        decode_array(&text).map_err(de::Error::custom)
    }
}
