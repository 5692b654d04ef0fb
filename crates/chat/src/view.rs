//! Display model derived from stored messages.
//!
//! Nothing here is cached: the view is rebuilt from the parts on every call, so it can
//! never drift from the text it was derived from.
use serde_json::Value;

use crate::durations::DurationTracker;
use crate::message::{Message, MessageId, Part, Role, ToolState};
use crate::segment::{SegmentedOutput, segment};
use crate::snapshot::duration_key;
use crate::stream::StreamStatus;

#[derive(Debug, Clone, PartialEq)]
pub enum PartView {
    /// User text, shown verbatim.
    Text(String),
    /// Assistant text split into the answer and its suggested follow-ups.
    Answer(SegmentedOutput),
    Reasoning {
        content: String,
        /// Only the trailing part of the last message while the reply is streaming.
        streaming: bool,
        duration_ms: Option<f64>,
    },
    ToolCall {
        call_id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        call_id: String,
        name: String,
        output: Option<Value>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageView {
    pub id: MessageId,
    pub role: Role,
    pub parts: Vec<PartView>,
}

pub fn conversation_view(
    messages: &[Message],
    status: &StreamStatus,
    durations: &DurationTracker,
) -> Vec<MessageView> {
    let last_index = messages.len().checked_sub(1);
    messages
        .iter()
        .enumerate()
        .map(|(index, message)| {
            let streaming_tail = status.is_streaming() && Some(index) == last_index;
            message_view(message, streaming_tail, durations)
        })
        .collect()
}

pub fn message_view(
    message: &Message,
    streaming_tail: bool,
    durations: &DurationTracker,
) -> MessageView {
    let last_part = message.parts.len().checked_sub(1);
    let parts = message
        .parts
        .iter()
        .enumerate()
        .map(|(index, part)| match part {
            Part::Text { content } => match message.role {
                Role::User => PartView::Text(content.clone()),
                Role::Assistant => PartView::Answer(segment(content)),
            },
            Part::Reasoning { content } => PartView::Reasoning {
                content: content.clone(),
                streaming: streaming_tail && Some(index) == last_part,
                duration_ms: durations.get(&duration_key(&message.id, index)),
            },
            Part::ToolInvocation {
                call_id,
                name,
                state: ToolState::Pending,
                input,
                ..
            } => PartView::ToolCall {
                call_id: call_id.clone(),
                name: name.clone(),
                input: input.clone(),
            },
            Part::ToolInvocation {
                call_id,
                name,
                state: ToolState::OutputAvailable,
                output,
                ..
            } => PartView::ToolResult {
                call_id: call_id.clone(),
                name: name.clone(),
                output: output.clone(),
            },
        })
        .collect();

    MessageView {
        id: message.id.clone(),
        role: message.role,
        parts,
    }
}
