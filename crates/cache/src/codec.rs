//! Serialization helpers shared by every cache domain.
//!
//! Keys, values, and op-log payloads all go through bincode. The "empty
//! sentinel" convention also lives here: a key or value is empty when it
//! equals its `Default` value, which is how a tombstone is told apart from
//! live data.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{Error, Result};

/// Serializes `value` to bytes.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| Error::Codec(e.to_string()))
}

/// Deserializes a value from `bytes`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| Error::Codec(e.to_string()))
}

/// Serialized byte length of `value`, for cache size accounting.
pub fn serialized_size<T: Serialize>(value: &T) -> Result<u32> {
    bincode::serialized_size(value)
        .map(|n| n as u32)
        .map_err(|e| Error::Codec(e.to_string()))
}

/// Whether `value` equals the domain's empty sentinel.
pub fn is_empty<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let v = ("k1".to_string(), 42u64);
        let bytes = encode(&v).unwrap();
        let back: (String, u64) = decode(&bytes).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn size_matches_encoding() {
        let v = "some value".to_string();
        assert_eq!(serialized_size(&v).unwrap() as usize, encode(&v).unwrap().len());
    }

    #[test]
    fn default_is_empty() {
        assert!(is_empty(&0u64));
        assert!(is_empty(&String::new()));
        assert!(!is_empty(&7u64));
    }
}
