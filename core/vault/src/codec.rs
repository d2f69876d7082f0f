//! Plaintext item encoding.
//!
//! Items are stored as JSON with a fixed field order, so encoding the same
//! item twice yields the same bytes. Decoding is strict: unknown fields,
//! missing fields and wrong types are all rejected.

use zeroize::Zeroizing;

use crate::item::VaultItem;
use passvault_common::{Error, Result};

/// Encode an item to the bytes that get encrypted.
pub fn encode(item: &VaultItem) -> Result<Zeroizing<Vec<u8>>> {
    serde_json::to_vec(item)
        .map(Zeroizing::new)
        .map_err(|e| Error::Format(describe(&e)))
}

/// Decode decrypted bytes back into an item.
///
/// # Errors
/// - `Error::Format` for malformed JSON or a schema mismatch
pub fn decode(bytes: &[u8]) -> Result<VaultItem> {
    let item: VaultItem = serde_json::from_slice(bytes).map_err(|e| Error::Format(describe(&e)))?;

    if item.id.is_empty() {
        return Err(Error::Format("item id is empty".to_string()));
    }
    Ok(item)
}

// serde_json messages can quote the offending value, which may be a secret.
fn describe(err: &serde_json::Error) -> String {
    let kind = match err.classify() {
        serde_json::error::Category::Io => "io failure",
        serde_json::error::Category::Syntax => "invalid JSON",
        serde_json::error::Category::Data => "schema mismatch",
        serde_json::error::Category::Eof => "truncated JSON",
    };
    format!("{} at line {} column {}", kind, err.line(), err.column())
}
