use std::path::{Path, PathBuf};

use snafu::ResultExt;

use super::error::{
    CreateDirectorySnafu, ReadValueSnafu, RemoveValueSnafu, RenameTempFileSnafu, StorageResult,
    WriteValueSnafu,
};
use super::key::StorageKey;
use super::{KeyValueStore, ensure_within_quota};

pub const DEFAULT_STORAGE_RELATIVE_PATH: &str = ".finsight/storage";

/// Directory-backed store: one `<key>.json` file per entry.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    max_value_bytes: Option<usize>,
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new(PathBuf::from(DEFAULT_STORAGE_RELATIVE_PATH))
    }
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_value_bytes: None,
        }
    }

    pub fn with_quota(mut self, max_value_bytes: usize) -> Self {
        self.max_value_bytes = Some(max_value_bytes);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn value_path(&self, key: &StorageKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.as_str()))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &StorageKey) -> StorageResult<Option<String>> {
        let path = self.value_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let value = std::fs::read_to_string(&path).context(ReadValueSnafu {
            stage: "file-get",
            path,
        })?;
        Ok(Some(value))
    }

    fn set(&self, key: &StorageKey, value: &str) -> StorageResult<()> {
        ensure_within_quota(key, value, self.max_value_bytes, "file-set-quota")?;

        std::fs::create_dir_all(&self.dir).context(CreateDirectorySnafu {
            stage: "file-set-create-directory",
            path: self.dir.clone(),
        })?;

        let path = self.value_path(key);
        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, value).context(WriteValueSnafu {
            stage: "file-set-write-temporary",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, &path).context(RenameTempFileSnafu {
            stage: "file-set-rename-temporary",
            from: temp_path,
            to: path.clone(),
        })?;

        tracing::debug!(key = %key, bytes = value.len(), path = ?path, "stored value");
        Ok(())
    }

    fn remove(&self, key: &StorageKey) -> StorageResult<()> {
        let path = self.value_path(key);
        if !path.exists() {
            return Ok(());
        }

        std::fs::remove_file(&path).context(RemoveValueSnafu {
            stage: "file-remove",
            path,
        })
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
    fn missing_value_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));

        assert!(store.get(&key()).unwrap().is_none());
        store.remove(&key()).unwrap();
    }

    #[test]
    fn set_creates_directory_and_replaces_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));

        store.set(&key(), r#"{"messages":[]}"#).unwrap();
        store.set(&key(), r#"{"messages":[1]}"#).unwrap();

        assert_eq!(
            store.get(&key()).unwrap().as_deref(),
            Some(r#"{"messages":[1]}"#)
        );
        assert!(store.value_path(&key()).exists());
        assert!(!store.value_path(&key()).with_extension("json.tmp").exists());
    }

    #[test]
    fn remove_deletes_the_backing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.set(&key(), "{}").unwrap();
        store.remove(&key()).unwrap();

        assert!(!store.value_path(&key()).exists());
        assert!(store.get(&key()).unwrap().is_none());
    }

    #[test]
    fn quota_failure_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).with_quota(8);

        store.set(&key(), "short").unwrap();
        let error = store.set(&key(), "much too long").unwrap_err();

        assert!(matches!(error, StorageError::QuotaExceeded { .. }));
        assert_eq!(store.get(&key()).unwrap().as_deref(), Some("short"));
    }
}
