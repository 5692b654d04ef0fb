use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use snafu::Snafu;
use tokio::sync::{mpsc, oneshot};

/// Identifier for one generation request.
///
/// Changes on every submit so events from a cancelled request can be told apart from the
/// live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl RequestId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: PromptRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub request_id: RequestId,
    pub messages: Vec<PromptMessage>,
    pub preamble: Option<String>,
}

impl GenerationRequest {
    pub fn new(request_id: RequestId, messages: Vec<PromptMessage>) -> Self {
        Self {
            request_id,
            messages,
            preamble: None,
        }
    }

    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = Some(preamble.into());
        self
    }

    /// Text of the newest user turn, if any.
    pub fn latest_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == PromptRole::User)
            .map(|message| message.content.as_str())
    }
}

/// Backend-agnostic stream payload.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEventPayload {
    TextDelta(String),
    ReasoningDelta(String),
    ToolCall {
        call_id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        call_id: String,
        output: Value,
    },
    Done,
    Error(String),
}

impl StreamEventPayload {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub request_id: RequestId,
    pub payload: StreamEventPayload,
}

pub type GenerationWorker = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
pub type GenerationResult<T> = Result<T, GenerationError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum GenerationError {
    #[snafu(display("generation request {request_id:?} has no messages"))]
    EmptyMessageSet {
        stage: &'static str,
        request_id: RequestId,
    },
    #[snafu(display("scripted backend '{backend_id}' has no reply left for {request_id:?}"))]
    ScriptExhausted {
        stage: &'static str,
        backend_id: String,
        request_id: RequestId,
    },
    #[snafu(display("generation backend failed on `{stage}`: {message}"))]
    Backend {
        stage: &'static str,
        message: String,
    },
}

/// Receiving half of one generation request.
///
/// Dropping the stream signals cancellation to the worker.
pub struct GenerationStream {
    request_id: RequestId,
    events: mpsc::UnboundedReceiver<StreamEvent>,
    cancel_tx: Option<oneshot::Sender<()>>,
}

pub struct GenerationHandle {
    pub stream: GenerationStream,
    pub worker: GenerationWorker,
}

impl GenerationStream {
    pub(crate) fn new(
        request_id: RequestId,
        events: mpsc::UnboundedReceiver<StreamEvent>,
        cancel_tx: oneshot::Sender<()>,
    ) -> Self {
        Self {
            request_id,
            events,
            cancel_tx: Some(cancel_tx),
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Signals the worker to stop and closes the receiver so no further event can be sent.
    /// Returns whether the worker was still listening.
    pub fn cancel(&mut self) -> bool {
        self.events.close();
        self.cancel_tx
            .take()
            .map(|tx| tx.send(()).is_ok())
            .unwrap_or(false)
    }
}

impl Drop for GenerationStream {
    fn drop(&mut self) {
        if let Some(cancel_tx) = self.cancel_tx.take() {
            let _ = cancel_tx.send(());
        }
    }
}

pub trait GenerationBackend: Send + Sync {
    fn id(&self) -> &str;
    fn stream(&self, request: GenerationRequest) -> GenerationResult<GenerationHandle>;
}

pub fn make_event_stream(
    request_id: RequestId,
) -> (
    mpsc::UnboundedSender<StreamEvent>,
    GenerationStream,
    oneshot::Receiver<()>,
) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (cancel_tx, cancel_rx) = oneshot::channel();
    (
        event_tx,
        GenerationStream::new(request_id, event_rx, cancel_tx),
        cancel_rx,
    )
}
