use std::sync::Arc;

use snafu::ensure;

use crate::durations::DurationTracker;
use crate::error::{ChatResult, EmptyConversationSnafu, InvalidMessageSnafu};
use crate::message::{Message, MessageId, current_unix_timestamp_millis};
use crate::persistence::SnapshotPersistence;
use crate::snapshot::ConversationSnapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// Stored messages were restored as-is.
    Hydrated { message_count: usize },
    /// Nothing was stored, so the greeting was injected and persisted.
    Welcomed(MessageId),
    AlreadyInitialized,
}

/// Single owner of the ordered conversation.
///
/// Every successful mutation writes the full snapshot through to persistence before
/// returning.
pub struct MessageStore {
    messages: Vec<Message>,
    durations: DurationTracker,
    persistence: Arc<dyn SnapshotPersistence>,
    initialized: bool,
}

impl MessageStore {
    pub fn new(persistence: Arc<dyn SnapshotPersistence>) -> Self {
        Self {
            messages: Vec::new(),
            durations: DurationTracker::new(),
            persistence,
            initialized: false,
        }
    }

    /// Hydrates from persistence, or greets an empty conversation. Runs once per store.
    pub fn initialize(&mut self, welcome_text: &str) -> InitOutcome {
        if self.initialized {
            return InitOutcome::AlreadyInitialized;
        }
        self.initialized = true;

        let snapshot = self.persistence.load();
        if !snapshot.messages.is_empty() {
            let message_count = snapshot.messages.len();
            self.messages = snapshot.messages;
            self.durations = DurationTracker::from_entries(snapshot.durations);
            tracing::info!(message_count, "restored stored conversation");
            return InitOutcome::Hydrated { message_count };
        }

        let id = MessageId::welcome(current_unix_timestamp_millis());
        self.messages = vec![Message::assistant_text(id.clone(), welcome_text)];
        self.durations = DurationTracker::new();
        self.persist();
        tracing::info!(message_id = %id, "injected welcome message");
        InitOutcome::Welcomed(id)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn append(&mut self, message: Message) -> ChatResult<()> {
        ensure!(
            !self.contains(&message.id),
            InvalidMessageSnafu {
                stage: "store-append",
                id: message.id.clone(),
                reason: "id already exists in the conversation",
            }
        );

        self.messages.push(message);
        self.persist();
        Ok(())
    }

    /// Applies `mutate` to the last message. The message id must survive the update.
    pub fn update_last<R>(&mut self, mutate: impl FnOnce(&mut Message) -> R) -> ChatResult<R> {
        let Some(last) = self.messages.last_mut() else {
            return EmptyConversationSnafu {
                stage: "store-update-last",
            }
            .fail();
        };

        let mut updated = last.clone();
        let result = mutate(&mut updated);
        ensure!(
            updated.id == last.id,
            InvalidMessageSnafu {
                stage: "store-update-last",
                id: updated.id.clone(),
                reason: "update changed the message id",
            }
        );

        *last = updated;
        self.persist();
        Ok(result)
    }

    /// Upserts an elapsed-time entry and persists it.
    pub fn record_duration(&mut self, key: impl Into<String>, duration_ms: f64) -> bool {
        let recorded = self.durations.record(key, duration_ms);
        if recorded {
            self.persist();
        }
        recorded
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.durations.clear();
        self.persist();
        tracing::info!("cleared conversation");
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.messages.iter().any(|message| &message.id == id)
    }

    pub fn durations(&self) -> &DurationTracker {
        &self.durations
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            messages: self.messages.clone(),
            durations: self.durations.entries().clone(),
        }
    }

    fn persist(&self) {
        self.persistence.save(&self.snapshot());
    }
}

impl std::fmt::Debug for MessageStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("MessageStore")
            .field("messages", &self.messages.len())
            .field("durations", &self.durations.len())
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}
