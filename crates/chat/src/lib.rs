//! Conversation core of the FinSight research assistant.
//!
//! [`ChatSession`] owns a [`MessageStore`] and drives one generation request at a time
//! through the [`StreamStatus`] machine. Every store mutation is written through to a
//! [`SnapshotPersistence`] port; assistant text is split into an answer and suggested
//! follow-ups by [`segment`] whenever a view is derived.
#![deny(unsafe_code)]

pub mod durations;
pub mod error;
pub mod input;
pub mod message;
pub mod persistence;
pub mod segment;
pub mod session;
pub mod settings;
pub mod snapshot;
pub mod store;
pub mod stream;
pub mod telemetry;
pub mod view;

pub use durations::DurationTracker;
pub use error::{ChatError, ChatResult, PersistenceError, PersistenceResult};
pub use input::{DEFAULT_MAX_INPUT_CHARS, InputRejection, validate_input};
pub use message::{Message, MessageId, Part, Role, ToolState};
pub use persistence::{DEFAULT_STORAGE_KEY, KeyValuePersistence, SnapshotPersistence};
pub use segment::{FOLLOWUP_HEADINGS, SegmentedOutput, segment};
pub use session::{ChatSession, STREAM_CLOSED_MESSAGE};
pub use settings::{ChatSettings, SettingsError, SettingsStore};
pub use snapshot::{ConversationSnapshot, duration_key};
pub use store::{InitOutcome, MessageStore};
pub use stream::{StreamStatus, StreamTransition, StreamTransitionRejection};
pub use telemetry::init_tracing;
pub use view::{MessageView, PartView, conversation_view};
