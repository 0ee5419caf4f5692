//! Key/value codecs for byte-oriented stores.
//!
//! [`PagedNodeStore`](super::PagedNodeStore) is generic over how keys and
//! values become bytes. The store handles framing (length prefixes, page
//! layout); the codec only converts a single key or value to and from an
//! exact byte slice.

use crate::common::{Error, Result};

/// Converts keys and values to and from bytes.
///
/// `decode_*` receives exactly the bytes the matching `encode_*` produced
/// (the store length-prefixes every item), so codecs never need to guess
/// where an item ends.
pub trait KeyValueCodec {
    type Key;
    type Value;

    fn encode_key(&self, key: &Self::Key, out: &mut Vec<u8>);
    fn decode_key(&self, bytes: &[u8]) -> Result<Self::Key>;

    fn encode_value(&self, value: &Self::Value, out: &mut Vec<u8>);
    fn decode_value(&self, bytes: &[u8]) -> Result<Self::Value>;
}

/// `u64` keys (little-endian) with UTF-8 string values.
///
/// The codec used by the crate's own integration tests, and a reasonable
/// default for simple indices.
#[derive(Debug, Default, Clone, Copy)]
pub struct U64StrCodec;

impl KeyValueCodec for U64StrCodec {
    type Key = u64;
    type Value = String;

    fn encode_key(&self, key: &u64, out: &mut Vec<u8>) {
        out.extend_from_slice(&key.to_le_bytes());
    }

    fn decode_key(&self, bytes: &[u8]) -> Result<u64> {
        let arr: [u8; 8] = bytes
            .try_into()
            .map_err(|_| Error::Codec(format!("expected 8 key bytes, got {}", bytes.len())))?;
        Ok(u64::from_le_bytes(arr))
    }

    fn encode_value(&self, value: &String, out: &mut Vec<u8>) {
        out.extend_from_slice(value.as_bytes());
    }

    fn decode_value(&self, bytes: &[u8]) -> Result<String> {
        String::from_utf8(bytes.to_vec()).map_err(|e| Error::Codec(format!("invalid UTF-8 value: {}", e)))
    }
}
