//! Generation channel contract consumed by the chat core.
//!
//! A backend turns a [`GenerationRequest`] into a [`GenerationHandle`]: a cancellable event
//! stream plus the worker future that feeds it. The caller owns both and decides where the
//! worker runs.
mod provider;
mod scripted;

pub use provider::{
    GenerationBackend, GenerationError, GenerationHandle, GenerationRequest, GenerationResult,
    GenerationStream, GenerationWorker, PromptMessage, PromptRole, RequestId, StreamEvent,
    StreamEventPayload, make_event_stream,
};
pub use scripted::{SCRIPTED_BACKEND_ID, ScriptedBackend, ScriptedReply};
