use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use futures::StreamExt;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use super::provider::{
    BackendSnafu, EmptyMessageSetSnafu, GenerationBackend, GenerationHandle, GenerationRequest,
    GenerationResult, GenerationWorker, RequestId, ScriptExhaustedSnafu, StreamEvent,
    StreamEventPayload, make_event_stream,
};

pub const SCRIPTED_BACKEND_ID: &str = "scripted";

/// One canned assistant turn.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScriptedReply {
    pub events: Vec<StreamEventPayload>,
    /// Keep the stream open after the last event until the consumer cancels.
    pub hold_open: bool,
    /// Refuse to open the stream at all, failing with this message.
    pub refusal: Option<String>,
}

impl ScriptedReply {
    pub fn new(events: Vec<StreamEventPayload>) -> Self {
        Self {
            events,
            hold_open: false,
            refusal: None,
        }
    }

    /// Plain text answer split on whitespace boundaries, followed by `Done`.
    pub fn text(text: &str) -> Self {
        let mut events = text
            .split_inclusive(char::is_whitespace)
            .map(|chunk| StreamEventPayload::TextDelta(chunk.to_string()))
            .collect::<Vec<_>>();
        events.push(StreamEventPayload::Done);
        Self::new(events)
    }

    pub fn reasoning(mut self, reasoning: &str) -> Self {
        let delta = StreamEventPayload::ReasoningDelta(reasoning.to_string());
        self.events.insert(0, delta);
        self
    }

    pub fn tool_call(mut self, call_id: &str, name: &str, input: Value, output: Value) -> Self {
        let at = self
            .events
            .iter()
            .position(|event| matches!(event, StreamEventPayload::TextDelta(_)))
            .unwrap_or(self.events.len());
        self.events.insert(
            at,
            StreamEventPayload::ToolResult {
                call_id: call_id.to_string(),
                output,
            },
        );
        self.events.insert(
            at,
            StreamEventPayload::ToolCall {
                call_id: call_id.to_string(),
                name: name.to_string(),
                input,
            },
        );
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.events.retain(|event| !event.is_terminal());
        let failure = StreamEventPayload::Error(message.to_string());
        self.events.push(failure);
        self
    }

    /// A turn the backend rejects before any event is produced.
    pub fn refused(message: &str) -> Self {
        Self {
            refusal: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn held_open(mut self) -> Self {
        self.events.retain(|event| !event.is_terminal());
        self.hold_open = true;
        self
    }
}

/// In-process backend that replays queued replies in order.
///
/// Used by tests and demos in place of a model transport.
pub struct ScriptedBackend {
    id: String,
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<GenerationRequest>>,
    chunk_delay: Option<Duration>,
}

impl ScriptedBackend {
    pub fn new(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            id: SCRIPTED_BACKEND_ID.to_string(),
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            chunk_delay: None,
        }
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    pub fn push_reply(&self, reply: ScriptedReply) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn next_reply(&self, request_id: RequestId) -> GenerationResult<ScriptedReply> {
        let reply = self
            .replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front());

        match reply {
            Some(reply) => Ok(reply),
            None => ScriptExhaustedSnafu {
                stage: "scripted-next-reply",
                backend_id: self.id.clone(),
                request_id,
            }
            .fail(),
        }
    }

    async fn run_stream_worker(
        request_id: RequestId,
        reply: ScriptedReply,
        chunk_delay: Option<Duration>,
        event_tx: mpsc::UnboundedSender<StreamEvent>,
        mut cancel_rx: oneshot::Receiver<()>,
    ) {
        let mut events = futures::stream::iter(reply.events);

        loop {
            tokio::select! {
                _ = &mut cancel_rx => {
                    tracing::debug!(request_id = ?request_id, "scripted stream cancelled");
                    return;
                }
                next_event = next_with_delay(&mut events, chunk_delay) => {
                    let Some(payload) = next_event else {
                        break;
                    };
                    if event_tx.send(StreamEvent { request_id, payload }).is_err() {
                        return;
                    }
                }
            }
        }

        if reply.hold_open {
            let _ = cancel_rx.await;
            tracing::debug!(request_id = ?request_id, "held-open scripted stream released");
        }
    }
}

async fn next_with_delay<S>(events: &mut S, delay: Option<Duration>) -> Option<StreamEventPayload>
where
    S: futures::Stream<Item = StreamEventPayload> + Unpin,
{
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    events.next().await
}

impl GenerationBackend for ScriptedBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn stream(&self, request: GenerationRequest) -> GenerationResult<GenerationHandle> {
        if request.messages.is_empty() {
            return EmptyMessageSetSnafu {
                stage: "scripted-stream",
                request_id: request.request_id,
            }
            .fail();
        }

        let request_id = request.request_id;
        let reply = self.next_reply(request_id)?;
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        if let Some(message) = reply.refusal {
            tracing::debug!(request_id = ?request_id, "scripted backend refusing request");
            return BackendSnafu {
                stage: "scripted-refusal",
                message,
            }
            .fail();
        }

        let (event_tx, stream, cancel_rx) = make_event_stream(request_id);
        let worker: GenerationWorker = Box::pin(Self::run_stream_worker(
            request_id,
            reply,
            self.chunk_delay,
            event_tx,
            cancel_rx,
        ));

        Ok(GenerationHandle { stream, worker })
    }
}

impl std::fmt::Debug for ScriptedBackend {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ScriptedBackend")
            .field("id", &self.id)
            .field("chunk_delay", &self.chunk_delay)
            .finish_non_exhaustive()
    }
}
