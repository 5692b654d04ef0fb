use std::path::PathBuf;

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    #[snafu(display("storage key '{raw}' is invalid: {reason}"))]
    InvalidKey {
        stage: &'static str,
        raw: String,
        reason: &'static str,
    },
    #[snafu(display(
        "value for '{key}' is {size_bytes} bytes, exceeding the {limit_bytes} byte quota"
    ))]
    QuotaExceeded {
        stage: &'static str,
        key: String,
        size_bytes: usize,
        limit_bytes: usize,
    },
    #[snafu(display("failed to create storage directory at {path:?} on `{stage}`: {source}"))]
    CreateDirectory {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to read value from {path:?} on `{stage}`: {source}"))]
    ReadValue {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to write value to {path:?} on `{stage}`: {source}"))]
    WriteValue {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "failed to replace value file from {from:?} to {to:?} on `{stage}`: {source}"
    ))]
    RenameTempFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to remove value at {path:?} on `{stage}`: {source}"))]
    RemoveValue {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("in-memory store lock was poisoned on `{stage}`"))]
    LockPoisoned { stage: &'static str },
}

pub type StorageResult<T> = Result<T, StorageError>;
