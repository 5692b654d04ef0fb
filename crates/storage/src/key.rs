use std::fmt;
use std::str::FromStr;

use super::error::{InvalidKeySnafu, StorageError, StorageResult};

const MAX_KEY_LEN: usize = 128;

/// Validated key for a [`KeyValueStore`](crate::KeyValueStore) entry.
///
/// Keys double as file names for [`FileStore`](crate::FileStore), so anything that could
/// escape the storage directory is rejected up front.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn parse(raw: &str) -> StorageResult<Self> {
        let reason = if raw.is_empty() {
            Some("key cannot be empty")
        } else if raw.len() > MAX_KEY_LEN {
            Some("key is longer than 128 bytes")
        } else if raw.contains('/') || raw.contains('\\') || raw.contains("..") {
            Some("key contains path separators")
        } else if raw.chars().any(char::is_control) {
            Some("key contains control characters")
        } else {
            None
        };

        match reason {
            Some(reason) => InvalidKeySnafu {
                stage: "parse-storage-key",
                raw: raw.to_string(),
                reason,
            }
            .fail(),
            None => Ok(Self(raw.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for StorageKey {
    type Err = StorageError;

    fn from_str(raw: &str) -> StorageResult<Self> {
        Self::parse(raw)
    }
}
