pub mod error;
pub mod file;
pub mod key;
pub mod memory;

use std::sync::Arc;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use key::StorageKey;
pub use memory::MemoryStore;

/// String-valued key/value store with `localStorage` semantics: one value per key,
/// whole-value reads and writes, no partial updates.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &StorageKey) -> StorageResult<Option<String>>;
    fn set(&self, key: &StorageKey, value: &str) -> StorageResult<()>;
    fn remove(&self, key: &StorageKey) -> StorageResult<()>;
}

impl<T> KeyValueStore for Arc<T>
where
    T: KeyValueStore + ?Sized,
{
    fn get(&self, key: &StorageKey) -> StorageResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &StorageKey, value: &str) -> StorageResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &StorageKey) -> StorageResult<()> {
        (**self).remove(key)
    }
}

pub(crate) fn ensure_within_quota(
    key: &StorageKey,
    value: &str,
    max_value_bytes: Option<usize>,
    stage: &'static str,
) -> StorageResult<()> {
    match max_value_bytes {
        Some(limit) if value.len() > limit => error::QuotaExceededSnafu {
            stage,
            key: key.to_string(),
            size_bytes: value.len(),
            limit_bytes: limit,
        }
        .fail(),
        _ => Ok(()),
    }
}
