//! Content hashing for set-shaped attributes.
//!
//! Set elements are addressed by a SHA-256 digest of a canonical encoding of
//! their value. The encoding is type-tagged and length-prefixed so that
//! structurally different values never share a byte stream, and map keys are
//! visited in sorted order so the digest is independent of insertion order.

use sha2::{Digest, Sha256};

use crate::value::Value;

const TAG_BOOL: u8 = b'b';
const TAG_INT: u8 = b'i';
const TAG_STRING: u8 = b's';
const TAG_LIST: u8 = b'l';
const TAG_MAP: u8 = b'm';

/// Hasher for computing content addresses of values.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordHasher;

impl RecordHasher {
    /// Creates a new record hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the hex-encoded content hash of a value.
    #[must_use]
    pub fn hash_value(&self, value: &Value) -> String {
        let mut hasher = Sha256::new();
        Self::feed(&mut hasher, value);
        hex::encode(hasher.finalize())
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }

    fn feed(hasher: &mut Sha256, value: &Value) {
        match value {
            Value::Bool(b) => {
                hasher.update([TAG_BOOL, u8::from(*b)]);
            }
            Value::Int(i) => {
                hasher.update([TAG_INT]);
                hasher.update(i.to_be_bytes());
            }
            Value::String(s) => {
                hasher.update([TAG_STRING]);
                Self::feed_bytes(hasher, s.as_bytes());
            }
            Value::List(items) => {
                hasher.update([TAG_LIST]);
                hasher.update((items.len() as u64).to_be_bytes());
                for item in items {
                    Self::feed(hasher, item);
                }
            }
            Value::Map(map) => {
                hasher.update([TAG_MAP]);
                hasher.update((map.len() as u64).to_be_bytes());
                // BTreeMap iteration is already key-sorted
                for (key, item) in map {
                    Self::feed_bytes(hasher, key.as_bytes());
                    Self::feed(hasher, item);
                }
            }
        }
    }

    fn feed_bytes(hasher: &mut Sha256, bytes: &[u8]) {
        hasher.update((bytes.len() as u64).to_be_bytes());
        hasher.update(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FieldMap;

    fn record(pairs: &[(&str, Value)]) -> Value {
        Value::Map(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect::<FieldMap>(),
        )
    }

    #[test]
    fn test_hash_deterministic() {
        let hasher = RecordHasher::new();
        let value = record(&[("segment", Value::from("corp")), ("asn", Value::Int(65000))]);

        assert_eq!(hasher.hash_value(&value), hasher.hash_value(&value));
        assert_eq!(hasher.hash_value(&value).len(), 64);
    }

    #[test]
    fn test_representation_matters() {
        let hasher = RecordHasher::new();
        let text = record(&[("asn", Value::from("65000"))]);
        let number = record(&[("asn", Value::Int(65000))]);

        assert_ne!(hasher.hash_value(&text), hasher.hash_value(&number));
    }

    #[test]
    fn test_no_concatenation_collisions() {
        let hasher = RecordHasher::new();
        let split = Value::List(vec![Value::from("ab"), Value::from("c")]);
        let joined = Value::List(vec![Value::from("a"), Value::from("bc")]);

        assert_ne!(hasher.hash_value(&split), hasher.hash_value(&joined));
    }

    #[test]
    fn test_short_hash() {
        let hasher = RecordHasher::new();
        let full_hash = "abcdef1234567890abcdef1234567890";
        let short = hasher.short_hash(full_hash);

        assert_eq!(short, "abcdef12");
        assert_eq!(short.len(), 8);
    }
}
