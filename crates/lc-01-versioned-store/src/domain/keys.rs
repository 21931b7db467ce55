//! # Key Encoding
//!
//! Keys are stored as bytes whose lexicographic order matches the key's
//! natural order, so table iteration is ascending without decoding.

use super::errors::StoreError;

/// A type usable as a table key.
pub trait StoreKey: Sized {
    /// Order-preserving byte encoding.
    fn encode_key(&self) -> Vec<u8>;

    /// Inverse of [`StoreKey::encode_key`].
    fn decode_key(bytes: &[u8]) -> Result<Self, StoreError>;
}

impl StoreKey for u64 {
    fn encode_key(&self) -> Vec<u8> {
        self.to_be_bytes().to_vec()
    }

    fn decode_key(bytes: &[u8]) -> Result<Self, StoreError> {
        let array: [u8; 8] = bytes.try_into().map_err(|_| {
            StoreError::Deserialization(format!("u64 key must be 8 bytes, got {}", bytes.len()))
        })?;
        Ok(u64::from_be_bytes(array))
    }
}

impl StoreKey for String {
    fn encode_key(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn decode_key(bytes: &[u8]) -> Result<Self, StoreError> {
        String::from_utf8(bytes.to_vec()).map_err(|e| StoreError::Deserialization(e.to_string()))
    }
}

/// Generic JSON keys use their canonical serialization (object members are
/// sorted, so equal values always encode identically).
impl StoreKey for serde_json::Value {
    fn encode_key(&self) -> Vec<u8> {
        // Serializing a Value cannot fail: all map keys are strings.
        serde_json::to_vec(self).unwrap_or_default()
    }

    fn decode_key(bytes: &[u8]) -> Result<Self, StoreError> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::Deserialization(e.to_string()))
    }
}
