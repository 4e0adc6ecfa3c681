//! In-process key-value store with change notifications.
//!
//! Every viewer holding the same `Arc<MemoryStore>` sees the others' writes
//! through [`KeyValueStore::subscribe`], the way tabs of one browser see each
//! other's `storage` events. The store can be switched off and given a byte
//! quota to exercise the degraded paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::broadcast;

use super::{KeyValueStore, StorageEvent};
use crate::error::StoreError;
use crate::sync::TabId;

const FEED_CAPACITY: usize = 64;

pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    available: AtomicBool,
    quota_bytes: Option<usize>,
    feed: broadcast::Sender<StorageEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            entries: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            quota_bytes: None,
            feed,
        }
    }

    /// Reject writes that would grow keys plus values past `bytes`.
    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota_bytes = Some(bytes);
        self
    }

    /// Simulate the store disappearing (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, String>>, StoreError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".into()));
        }
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }

    fn notify(&self, key: &str, value: Option<&str>, origin: &TabId) {
        // No receivers is fine: nobody else is watching.
        let _ = self.feed.send(StorageEvent {
            key: key.to_string(),
            value: value.map(str::to_string),
            origin: origin.clone(),
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str, origin: &TabId) -> Result<(), StoreError> {
        {
            let mut entries = self.entries()?;
            if let Some(quota) = self.quota_bytes {
                let others: usize = entries
                    .iter()
                    .filter(|(k, _)| k.as_str() != key)
                    .map(|(k, v)| k.len() + v.len())
                    .sum();
                let bytes = key.len() + value.len();
                if others + bytes > quota {
                    return Err(StoreError::QuotaExceeded {
                        key: key.to_string(),
                        bytes,
                    });
                }
            }
            entries.insert(key.to_string(), value.to_string());
        }
        self.notify(key, Some(value), origin);
        Ok(())
    }

    fn remove(&self, key: &str, origin: &TabId) -> Result<(), StoreError> {
        let removed = self.entries()?.remove(key).is_some();
        if removed {
            self.notify(key, None, origin);
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = self.entries()?.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<StorageEvent>> {
        Some(self.feed.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let store = MemoryStore::new();
        let tab = TabId::new();
        store.set("a", "1", &tab).unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        store.remove("a", &tab).unwrap();
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn writes_are_broadcast_with_origin() {
        let store = MemoryStore::new();
        let mut feed = store.subscribe().unwrap();
        let tab = TabId::new();
        store.set("k", "v", &tab).unwrap();
        store.remove("k", &tab).unwrap();

        let set = feed.try_recv().unwrap();
        assert_eq!(set.value.as_deref(), Some("v"));
        assert_eq!(set.origin, tab);
        let removed = feed.try_recv().unwrap();
        assert_eq!(removed.value, None);
    }

    #[test]
    fn quota_rejects_oversized_write() {
        let store = MemoryStore::new().with_quota(10);
        let tab = TabId::new();
        store.set("k", "12345", &tab).unwrap();
        let err = store.set("k", "1234567890", &tab).unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { bytes: 11, .. }));
        assert_eq!(store.get("k").unwrap().as_deref(), Some("12345"));
    }

    #[test]
    fn unavailable_store_errors() {
        let store = MemoryStore::new();
        store.set_available(false);
        let err = store.get("k").unwrap_err();
        assert!(err.is_unavailable());
        store.set_available(true);
        assert_eq!(store.get("k").unwrap(), None);
    }
}
