use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::error::{LockPoisonedSnafu, StorageResult};
use super::key::StorageKey;
use super::{KeyValueStore, ensure_within_quota};

/// In-memory store for tests and ephemeral sessions.
///
/// Clones share the same entries, so a test can hand one clone to the code under test and
/// inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<StorageKey, String>>>,
    max_value_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(mut self, max_value_bytes: usize) -> Self {
        self.max_value_bytes = Some(max_value_bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.read().map_or(0, |entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &StorageKey) -> StorageResult<Option<String>> {
        let entries = self.entries.read().map_err(|_| {
            LockPoisonedSnafu {
                stage: "memory-get",
            }
            .build()
        })?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &StorageKey, value: &str) -> StorageResult<()> {
        ensure_within_quota(key, value, self.max_value_bytes, "memory-set-quota")?;

        let mut entries = self.entries.write().map_err(|_| {
            LockPoisonedSnafu {
                stage: "memory-set",
            }
            .build()
        })?;
        entries.insert(key.clone(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &StorageKey) -> StorageResult<()> {
        let mut entries = self.entries.write().map_err(|_| {
            LockPoisonedSnafu {
                stage: "memory-remove",
            }
            .build()
        })?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageError;

    fn key() -> StorageKey {
        StorageKey::parse("chat-messages").unwrap()
    }

    #[test]
    fn clones_share_entries() {
        let store = MemoryStore::new();
        let observer = store.clone();

        store.set(&key(), "{}").unwrap();
        assert_eq!(observer.get(&key()).unwrap().as_deref(), Some("{}"));

        observer.remove(&key()).unwrap();
        assert!(store.get(&key()).unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn quota_rejects_oversized_values_and_keeps_previous_value() {
        let store = MemoryStore::new().with_quota(4);
        store.set(&key(), "abcd").unwrap();

        let error = store.set(&key(), "abcde").unwrap_err();
        assert!(matches!(
            error,
            StorageError::QuotaExceeded {
                size_bytes: 5,
                limit_bytes: 4,
                ..
            }
        ));
        assert_eq!(store.get(&key()).unwrap().as_deref(), Some("abcd"));
    }
}
