use std::sync::Arc;
use std::time::Instant;

use finsight_llm::{
    GenerationBackend, GenerationRequest, GenerationStream, PromptMessage, PromptRole, RequestId,
    StreamEvent, StreamEventPayload,
};
use snafu::ResultExt;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::{ChatResult, GenerationSnafu, NoRuntimeSnafu, StreamTransitionSnafu};
use crate::input::{DEFAULT_MAX_INPUT_CHARS, validate_input};
use crate::message::{Message, MessageId, Role};
use crate::snapshot::duration_key;
use crate::store::{InitOutcome, MessageStore};
use crate::stream::{StreamStatus, StreamTransition, StreamTransitionRejection};
use crate::view::{MessageView, conversation_view};

pub const STREAM_CLOSED_MESSAGE: &str = "generation stream ended before a terminal event";

struct ActiveGeneration {
    stream: GenerationStream,
    worker: JoinHandle<()>,
    /// Created lazily on the first content event so an empty reply leaves no trace.
    assistant_message_id: Option<MessageId>,
}

struct ReasoningTimer {
    key: String,
    started_at: Instant,
}

/// Drives one conversation: validates input, opens generation requests, and folds their
/// events into the [`MessageStore`].
///
/// Events are applied one at a time through [`ChatSession::pump`]; nothing else mutates the
/// store while a request is outstanding.
pub struct ChatSession {
    store: MessageStore,
    status: StreamStatus,
    backend: Arc<dyn GenerationBackend>,
    max_input_chars: usize,
    preamble: Option<String>,
    next_request_id: RequestId,
    active: Option<ActiveGeneration>,
    reasoning_timer: Option<ReasoningTimer>,
}

impl ChatSession {
    pub fn new(store: MessageStore, backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            store,
            status: StreamStatus::default(),
            backend,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            preamble: None,
            next_request_id: RequestId::new(1),
            active: None,
            reasoning_timer: None,
        }
    }

    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self
    }

    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = Some(preamble.into());
        self
    }

    pub fn initialize(&mut self, welcome_text: &str) -> InitOutcome {
        self.store.initialize(welcome_text)
    }

    pub fn status(&self) -> &StreamStatus {
        &self.status
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn messages(&self) -> &[Message] {
        self.store.messages()
    }

    /// Display model of the whole conversation, recomputed from the stored parts.
    pub fn view(&self) -> Vec<MessageView> {
        conversation_view(self.store.messages(), &self.status, self.store.durations())
    }

    /// Validates `text`, appends it as a user message and opens a generation request.
    ///
    /// Invalid input and a busy session are rejected before anything changes. A backend
    /// that refuses the request leaves the user message in place and the status in
    /// `Error`.
    pub fn send(&mut self, text: &str) -> ChatResult<RequestId> {
        let text = validate_input(text, self.max_input_chars)?;
        let runtime = Handle::try_current().context(NoRuntimeSnafu {
            stage: "session-send",
        })?;

        let request_id = self.next_request_id;
        let submitted = self
            .status
            .apply(StreamTransition::Submit(request_id))
            .map_err(|rejection| {
                tracing::warn!(request_id = request_id.0, %rejection, "submit rejected");
                StreamTransitionSnafu {
                    stage: "session-send",
                    rejection,
                }
                .build()
            })?;

        self.store
            .append(Message::user_text(MessageId::generate(), text))?;
        self.status = submitted;
        // Reserve the id immediately so a retry never reuses it.
        self.next_request_id = request_id.next();

        let mut request = GenerationRequest::new(request_id, self.prompt_messages());
        if let Some(preamble) = &self.preamble {
            request = request.with_preamble(preamble.clone());
        }

        let handle = match self.backend.stream(request) {
            Ok(handle) => handle,
            Err(error) => {
                tracing::warn!(
                    request_id = request_id.0,
                    backend = self.backend.id(),
                    %error,
                    "generation backend refused request"
                );
                self.status = StreamStatus::Error {
                    request_id,
                    message: error.to_string(),
                };
                return Err(error).context(GenerationSnafu {
                    stage: "session-open-stream",
                });
            }
        };

        tracing::debug!(
            request_id = request_id.0,
            backend = self.backend.id(),
            "generation request submitted"
        );
        self.active = Some(ActiveGeneration {
            stream: handle.stream,
            worker: runtime.spawn(handle.worker),
            assistant_message_id: None,
        });
        Ok(request_id)
    }

    /// Sends a suggested follow-up exactly as if the user had typed it.
    pub fn follow_up(&mut self, followup: &str) -> ChatResult<RequestId> {
        self.send(followup)
    }

    /// Waits for the next event of the active request and applies it. Returns `false` when
    /// no request is active.
    pub async fn pump(&mut self) -> bool {
        let Some(active) = self.active.as_mut() else {
            return false;
        };
        let request_id = active.stream.request_id();

        let next_event = active.stream.recv().await;
        match next_event {
            Some(event) => self.apply_event(event),
            None => {
                tracing::warn!(request_id = request_id.0, "generation stream closed early");
                self.settle(
                    StreamTransition::Fail {
                        request_id,
                        message: STREAM_CLOSED_MESSAGE.to_string(),
                    },
                    "session-stream-closed",
                );
            }
        }
        true
    }

    pub async fn run_to_completion(&mut self) -> &StreamStatus {
        while self.pump().await {}
        &self.status
    }

    /// Folds one generation event into the conversation. Events from any request other
    /// than the active one are dropped.
    pub fn apply_event(&mut self, event: StreamEvent) {
        let StreamEvent {
            request_id,
            payload,
        } = event;
        if !self.status.accepts_event(request_id) {
            tracing::debug!(request_id = request_id.0, "ignoring stale generation event");
            return;
        }

        match payload {
            StreamEventPayload::TextDelta(delta) => {
                self.mark_streaming(request_id);
                self.finish_reasoning_timer();
                self.update_assistant(|message| message.append_text(&delta));
            }
            StreamEventPayload::ReasoningDelta(delta) => {
                self.mark_streaming(request_id);
                if let Some(index) =
                    self.update_assistant(|message| message.append_reasoning(&delta))
                {
                    self.start_reasoning_timer(index);
                }
            }
            StreamEventPayload::ToolCall {
                call_id,
                name,
                input,
            } => {
                self.mark_streaming(request_id);
                self.finish_reasoning_timer();
                self.update_assistant(|message| message.push_tool_call(&call_id, &name, input));
            }
            StreamEventPayload::ToolResult { call_id, output } => {
                self.mark_streaming(request_id);
                self.finish_reasoning_timer();
                let completed =
                    self.update_assistant(|message| message.complete_tool_call(&call_id, output));
                if completed != Some(true) {
                    tracing::warn!(
                        request_id = request_id.0,
                        call_id = %call_id,
                        "tool result has no pending invocation"
                    );
                }
            }
            StreamEventPayload::Done => {
                tracing::debug!(request_id = request_id.0, "generation completed");
                self.settle(StreamTransition::Complete(request_id), "session-complete");
            }
            StreamEventPayload::Error(message) => {
                tracing::warn!(request_id = request_id.0, error = %message, "generation failed");
                self.settle(
                    StreamTransition::Fail {
                        request_id,
                        message,
                    },
                    "session-fail",
                );
            }
        }
    }

    /// Cancels the outstanding request. Whatever the assistant produced so far is kept.
    pub fn stop(&mut self) -> ChatResult<()> {
        let active_request = self.active.as_ref().map(|active| active.stream.request_id());
        let Some(request_id) = active_request else {
            return StreamTransitionSnafu {
                stage: "session-stop",
                rejection: StreamTransitionRejection::NoActiveRequest,
            }
            .fail();
        };

        let next = self
            .status
            .apply(StreamTransition::Stop(request_id))
            .map_err(|rejection| {
                StreamTransitionSnafu {
                    stage: "session-stop",
                    rejection,
                }
                .build()
            })?;
        self.finish_reasoning_timer();
        self.status = next;
        self.release_active();
        tracing::info!(request_id = request_id.0, "generation stopped");
        Ok(())
    }

    /// Stores an elapsed time reported by the display layer.
    pub fn record_duration(&mut self, key: impl Into<String>, duration_ms: f64) -> bool {
        self.store.record_duration(key, duration_ms)
    }

    pub fn append(&mut self, message: Message) -> ChatResult<()> {
        self.store.append(message)
    }

    /// Stops any outstanding request, then empties the conversation and its storage.
    pub fn clear(&mut self) {
        if self.active.is_some()
            && let Err(error) = self.stop()
        {
            tracing::warn!(%error, "failed to stop generation before clearing");
        }
        self.store.clear();
    }

    fn prompt_messages(&self) -> Vec<PromptMessage> {
        self.store
            .messages()
            .iter()
            .filter_map(|message| {
                let content = message.text();
                if content.is_empty() {
                    return None;
                }
                let role = match message.role {
                    Role::User => PromptRole::User,
                    Role::Assistant => PromptRole::Assistant,
                };
                Some(PromptMessage::new(role, content))
            })
            .collect()
    }

    fn mark_streaming(&mut self, request_id: RequestId) {
        if self.status.is_streaming() {
            return;
        }
        match self.status.apply(StreamTransition::Content(request_id)) {
            Ok(next) => {
                tracing::debug!(request_id = request_id.0, "generation streaming");
                self.status = next;
            }
            Err(rejection) => {
                tracing::warn!(
                    request_id = request_id.0,
                    %rejection,
                    "content transition rejected"
                );
            }
        }
    }

    /// Applies `mutate` to the assistant message of the active request, creating it first
    /// if this is the first content of the reply.
    fn update_assistant<R>(&mut self, mutate: impl FnOnce(&mut Message) -> R) -> Option<R> {
        let active = self.active.as_mut()?;
        if active.assistant_message_id.is_none() {
            let id = MessageId::generate();
            if let Err(error) = self.store.append(Message::assistant_empty(id.clone())) {
                tracing::warn!(%error, "failed to start assistant message");
                return None;
            }
            active.assistant_message_id = Some(id);
        }

        match self.store.update_last(mutate) {
            Ok(result) => Some(result),
            Err(error) => {
                tracing::warn!(%error, "failed to update assistant message");
                None
            }
        }
    }

    fn start_reasoning_timer(&mut self, part_index: usize) {
        let Some(message_id) = self
            .active
            .as_ref()
            .and_then(|active| active.assistant_message_id.as_ref())
        else {
            return;
        };
        let key = duration_key(message_id, part_index);
        if self
            .reasoning_timer
            .as_ref()
            .is_some_and(|timer| timer.key == key)
        {
            return;
        }

        self.finish_reasoning_timer();
        self.reasoning_timer = Some(ReasoningTimer {
            key,
            started_at: Instant::now(),
        });
    }

    fn finish_reasoning_timer(&mut self) {
        let Some(timer) = self.reasoning_timer.take() else {
            return;
        };
        let duration_ms = timer.started_at.elapsed().as_secs_f64() * 1000.0;
        tracing::debug!(key = %timer.key, duration_ms, "reasoning finished");
        self.store.record_duration(timer.key, duration_ms);
    }

    fn settle(&mut self, transition: StreamTransition, stage: &'static str) {
        self.finish_reasoning_timer();
        match self.status.apply(transition) {
            Ok(next) => self.status = next,
            Err(rejection) => {
                tracing::warn!(stage, %rejection, "terminal transition rejected");
            }
        }
        self.release_active();
    }

    fn release_active(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.stream.cancel();
            active.worker.abort();
        }
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ChatSession")
            .field("status", &self.status)
            .field("backend", &self.backend.id())
            .field("messages", &self.store.len())
            .field("next_request_id", &self.next_request_id)
            .finish_non_exhaustive()
    }
}
