use std::fmt;

use finsight_llm::RequestId;

/// Lifecycle of the in-flight generation request.
///
/// `Idle` only exists before the first submit; afterwards the machine rests in `Ready` or
/// `Error` between requests.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamStatus {
    #[default]
    Idle,
    Submitted(RequestId),
    Streaming(RequestId),
    Ready,
    Error {
        request_id: RequestId,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTransition {
    Submit(RequestId),
    /// Any content delta; the first one moves `Submitted` to `Streaming`.
    Content(RequestId),
    Complete(RequestId),
    Fail {
        request_id: RequestId,
        message: String,
    },
    Stop(RequestId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTransitionRejection {
    AlreadyActive {
        active: RequestId,
        attempted: RequestId,
    },
    NoActiveRequest,
    RequestMismatch {
        active: RequestId,
        attempted: RequestId,
    },
}

impl fmt::Display for StreamTransitionRejection {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyActive { active, attempted } => write!(
                formatter,
                "request {} is still active, cannot start {}",
                active.0, attempted.0
            ),
            Self::NoActiveRequest => formatter.write_str("no generation request is active"),
            Self::RequestMismatch { active, attempted } => write!(
                formatter,
                "event for request {} does not match active request {}",
                attempted.0, active.0
            ),
        }
    }
}

pub type StreamTransitionResult = Result<StreamStatus, StreamTransitionRejection>;

impl StreamStatus {
    /// Wire label used by the generation channel contract.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Submitted(_) => "submitted",
            Self::Streaming(_) => "streaming",
            Self::Ready => "ready",
            Self::Error { .. } => "error",
        }
    }

    pub fn active_request(&self) -> Option<RequestId> {
        match self {
            Self::Submitted(request_id) | Self::Streaming(request_id) => Some(*request_id),
            Self::Idle | Self::Ready | Self::Error { .. } => None,
        }
    }

    /// True while a request is outstanding: submit is disabled and stop is offered.
    pub fn is_busy(&self) -> bool {
        self.active_request().is_some()
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming(_))
    }

    pub fn accepts_event(&self, request_id: RequestId) -> bool {
        self.active_request() == Some(request_id)
    }

    pub fn apply(&self, transition: StreamTransition) -> StreamTransitionResult {
        match transition {
            StreamTransition::Submit(request_id) => self.apply_submit(request_id),
            StreamTransition::Content(request_id) => {
                self.apply_active(request_id, Self::Streaming(request_id))
            }
            StreamTransition::Complete(request_id) => self.apply_active(request_id, Self::Ready),
            StreamTransition::Fail {
                request_id,
                message,
            } => self.apply_active(
                request_id,
                Self::Error {
                    request_id,
                    message,
                },
            ),
            StreamTransition::Stop(request_id) => self.apply_active(request_id, Self::Ready),
        }
    }

    fn apply_submit(&self, request_id: RequestId) -> StreamTransitionResult {
        match self.active_request() {
            Some(active) => Err(StreamTransitionRejection::AlreadyActive {
                active,
                attempted: request_id,
            }),
            None => Ok(Self::Submitted(request_id)),
        }
    }

    fn apply_active(&self, request_id: RequestId, next: StreamStatus) -> StreamTransitionResult {
        match self.active_request() {
            Some(active) if active == request_id => Ok(next),
            Some(active) => Err(StreamTransitionRejection::RequestMismatch {
                active,
                attempted: request_id,
            }),
            None => Err(StreamTransitionRejection::NoActiveRequest),
        }
    }
}
