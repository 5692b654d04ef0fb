use finsight_llm::GenerationError;
use finsight_storage::StorageError;
use snafu::Snafu;

use crate::input::InputRejection;
use crate::message::MessageId;
use crate::stream::StreamTransitionRejection;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ChatError {
    #[snafu(display("message '{id}' rejected on `{stage}`: {reason}"))]
    InvalidMessage {
        stage: &'static str,
        id: MessageId,
        reason: &'static str,
    },
    #[snafu(display("conversation has no messages to update on `{stage}`"))]
    EmptyConversation { stage: &'static str },
    #[snafu(display("input rejected: {rejection}"))]
    InvalidInput {
        stage: &'static str,
        rejection: InputRejection,
    },
    #[snafu(display("stream transition rejected on `{stage}`: {rejection}"))]
    StreamTransition {
        stage: &'static str,
        rejection: StreamTransitionRejection,
    },
    #[snafu(display("generation failed on `{stage}`, {source}"))]
    Generation {
        stage: &'static str,
        source: GenerationError,
    },
    #[snafu(display("no Tokio runtime available on `{stage}`"))]
    NoRuntime {
        stage: &'static str,
        source: tokio::runtime::TryCurrentError,
    },
}

pub type ChatResult<T> = Result<T, ChatError>;

/// Failures inside the persistence adapter. These never leave the adapter's public
/// `load`/`save`; they are logged and the caller gets a usable value instead.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PersistenceError {
    #[snafu(display("failed to read snapshot '{key}' on `{stage}`: {source}"))]
    ReadStore {
        stage: &'static str,
        key: String,
        source: StorageError,
    },
    #[snafu(display("stored snapshot '{key}' is malformed on `{stage}`: {source}"))]
    DecodeSnapshot {
        stage: &'static str,
        key: String,
        source: serde_json::Error,
    },
    #[snafu(display("stored snapshot '{key}' repeats message id '{id}'"))]
    DuplicateMessageId {
        stage: &'static str,
        key: String,
        id: MessageId,
    },
    #[snafu(display("failed to encode snapshot on `{stage}`: {source}"))]
    EncodeSnapshot {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write snapshot '{key}' on `{stage}`: {source}"))]
    WriteStore {
        stage: &'static str,
        key: String,
        source: StorageError,
    },
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;
