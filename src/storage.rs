use crate::error::{DatavisError, Result};
use log::warn;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Logical name of the file-name -> rows record
pub const DATASETS: &str = "datavis-canvas-datasets";
/// Logical name of the active file pointer record
pub const ACTIVE_FILENAME: &str = "datavis-canvas-active-filename";
/// Logical name of the saved analysis list
pub const HISTORY: &str = "datavis-canvas-history";

/// Durable string key/value storage
///
/// This is the only thing the workspace knows about persistence. Values are
/// serialized JSON; every write replaces the whole value stored under a key.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for &mut S {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

/// Volatile store, used for the sign-in record and in tests
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// A store shared between several workspaces
///
/// The web server keeps one of these around the durable store and hands a
/// clone to every signed-in session.
pub struct SharedStore<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> SharedStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, S>> {
        self.inner
            .lock()
            .map_err(|_| DatavisError::Storage("store lock poisoned".to_string()))
    }
}

impl<S> Clone for SharedStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: KeyValueStore> KeyValueStore for SharedStore<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.lock()?.get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.lock()?.set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.lock()?.remove(key)
    }
}

/// Derive the physical key of a logical record for an identity
///
/// # Examples
/// ```
/// use datavis::storage::{scoped_key, HISTORY};
///
/// assert_eq!(scoped_key(HISTORY, "a@x.com"), "datavis-canvas-history-a@x.com");
/// ```
pub fn scoped_key(logical: &str, identity: &str) -> String {
    format!("{}-{}", logical, identity)
}

/// Outcome of reading a typed record
#[derive(Clone, Debug, PartialEq)]
pub enum Loaded<T> {
    /// Nothing stored under the key
    Absent,
    Present(T),
    /// The stored value did not deserialize; the key has already been removed
    Corrupt,
}

impl<T> Loaded<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Loaded::Present(value) => Some(value),
            Loaded::Absent | Loaded::Corrupt => None,
        }
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, Loaded::Corrupt)
    }
}

/// Typed JSON access to the records of one identity
pub struct ScopedStore<'a, S: KeyValueStore + ?Sized> {
    store: &'a mut S,
    identity: &'a str,
}

impl<'a, S: KeyValueStore + ?Sized> ScopedStore<'a, S> {
    pub fn new(store: &'a mut S, identity: &'a str) -> Self {
        Self { store, identity }
    }

    pub fn key(&self, logical: &str) -> String {
        scoped_key(logical, self.identity)
    }

    /// Read and deserialize a record
    ///
    /// A value that fails to deserialize is removed from the store before
    /// returning `Loaded::Corrupt`.
    pub fn load<T: DeserializeOwned>(&mut self, logical: &str) -> Result<Loaded<T>> {
        let key = self.key(logical);
        let Some(raw) = self.store.get(&key)? else {
            return Ok(Loaded::Absent);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Loaded::Present(value)),
            Err(e) => {
                warn!("removing corrupted record {}: {}", key, e);
                self.store.remove(&key)?;
                Ok(Loaded::Corrupt)
            }
        }
    }

    /// Serialize and store a record, replacing whatever was there
    pub fn save<T: Serialize + ?Sized>(&mut self, logical: &str, value: &T) -> Result<()> {
        let key = self.key(logical);
        let json = serde_json::to_string(value)?;
        self.store.set(&key, &json)
    }

    pub fn clear(&mut self, logical: &str) -> Result<()> {
        let key = self.key(logical);
        self.store.remove(&key)
    }
}
