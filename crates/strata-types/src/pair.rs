use bytes::Bytes;

use crate::key::Key;

/// A key together with its value: the unit written to a datastore.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pair {
    pub key: Key,
    pub value: Bytes,
}

impl Pair {
    pub fn new(key: Key, value: impl Into<Bytes>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

/// A single query result.
///
/// `value` is `None` only for keys-only queries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub key: Key,
    pub value: Option<Bytes>,
}

impl Entry {
    /// An entry carrying both key and value.
    pub fn new(key: Key, value: impl Into<Bytes>) -> Self {
        Self {
            key,
            value: Some(value.into()),
        }
    }

    /// An entry carrying only the key.
    pub fn key_only(key: Key) -> Self {
        Self { key, value: None }
    }

    /// The value bytes, or an empty slice for keys-only entries.
    pub fn value_bytes(&self) -> &[u8] {
        self.value.as_deref().unwrap_or_default()
    }

    /// Drop the value, keeping only the key.
    pub fn into_key_only(self) -> Self {
        Self::key_only(self.key)
    }

    /// Replace the key, keeping the value.
    pub fn with_key(self, key: Key) -> Self {
        Self {
            key,
            value: self.value,
        }
    }
}

impl From<Pair> for Entry {
    fn from(pair: Pair) -> Self {
        Self {
            key: pair.key,
            value: Some(pair.value),
        }
    }
}
