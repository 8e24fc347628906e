//! Per-field serialization of link list updates.
//!
//! Updating a link list is a read-modify-write against the record store.
//! Two uploads to the same field that interleave would both read the old
//! value and one appended link would be lost. Holding the field's lock for
//! the whole read-modify-write prevents that within this process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use annex_storage::ResourceIdentifier;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = HashMap<String, Arc<AsyncMutex<()>>>;

/// Registry of per-field locks. Cheap to clone; clones share the registry.
#[derive(Clone, Default)]
pub struct FieldLocks {
    inner: Arc<Mutex<LockMap>>,
}

impl FieldLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to the field named by `id`.
    pub async fn lock(&self, id: &ResourceIdentifier) -> FieldGuard {
        let key = id.to_string();
        let mutex = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(key.clone()).or_default().clone()
        };

        let guard = mutex.lock_owned().await;

        FieldGuard {
            locks: self.clone(),
            key,
            guard: Some(guard),
        }
    }

    /// Number of fields with a live lock entry.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, key: &str) {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        // Only the map itself still references the mutex: nobody holds or
        // waits for it.
        if map.get(key).is_some_and(|m| Arc::strong_count(m) == 1) {
            map.remove(key);
        }
    }
}

/// Exclusive access to one field; released on drop.
pub struct FieldGuard {
    locks: FieldLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for FieldGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.release(&self.key);
    }
}
