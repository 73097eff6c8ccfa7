use crate::{Result, Store, validate_key};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// A simple in-memory `Store` adapter.
///
/// - Values are encoded as JSON with `serde_json`.
/// - Data is stored as raw bytes in a `HashMap`.
/// - Clones share the same map, so a test can keep a handle to a store it
///   handed to a [`Combiner`](crate::Combiner).
/// - Intended for tests, local development, and ephemeral usage.
///
/// `close` is a no-op and may be called any number of times.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new in-memory store from already-encoded entries.
    pub fn from_map(map: HashMap<String, Vec<u8>>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(map)),
        }
    }

    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        self.inner.read().expect("poisoned lock").len()
    }

    /// Returns true if there are no stored entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.read().expect("poisoned lock").contains_key(key)
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.inner.write().expect("poisoned lock").clear();
    }

    /// Get a copy of the encoded bytes for `key` (useful for tests).
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.read().expect("poisoned lock").get(key).cloned()
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Avoid dumping potentially large in-memory contents.
        f.debug_struct("MemoryStore")
            .field("len", &self.len())
            .finish()
    }
}

impl Store for MemoryStore {
    async fn set<V>(&self, key: &str, value: &V) -> Result<()>
    where
        V: Serialize + Clone + Send + Sync + 'static,
    {
        validate_key(key)?;
        let encoded = serde_json::to_vec(value)?;

        let mut map = self.inner.write().expect("poisoned lock");
        map.insert(key.to_string(), encoded);
        Ok(())
    }

    async fn get<V>(&self, key: &str) -> Result<Option<V>>
    where
        V: DeserializeOwned + PartialEq + Send,
    {
        validate_key(key)?;
        let encoded = {
            let map = self.inner.read().expect("poisoned lock");
            match map.get(key) {
                Some(bytes) => bytes.clone(),
                None => return Ok(None),
            }
        };

        Ok(Some(serde_json::from_slice(&encoded)?))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        let mut map = self.inner.write().expect("poisoned lock");
        map.remove(key);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
