use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::message::{Message, MessageId};

/// Full persisted form of one conversation.
///
/// Both fields are required on decode: a stored value missing either one is treated as
/// foreign data rather than patched up.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConversationSnapshot {
    pub messages: Vec<Message>,
    pub durations: BTreeMap<String, f64>,
}

impl ConversationSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.durations.is_empty()
    }

    /// First message id that appears more than once, if any.
    pub fn duplicate_message_id(&self) -> Option<&MessageId> {
        let mut seen = std::collections::HashSet::with_capacity(self.messages.len());
        self.messages
            .iter()
            .map(|message| &message.id)
            .find(|id| !seen.insert(*id))
    }
}

/// Key of a duration entry: `"{message_id}-{part_index}"`.
pub fn duration_key(message_id: &MessageId, part_index: usize) -> String {
    format!("{message_id}-{part_index}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let mut snapshot = ConversationSnapshot::empty();
        snapshot.messages.push(Message::user_text(
            MessageId::new("u-1"),
            "How did Dabur's EBITDA move?",
        ));
        snapshot.durations.insert("a-1-0".to_string(), 1532.5);

        let encoded = serde_json::to_string(&snapshot).unwrap();
        let decoded: ConversationSnapshot = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn missing_fields_do_not_decode() {
        assert!(serde_json::from_str::<ConversationSnapshot>(r#"{"messages":[]}"#).is_err());
        assert!(serde_json::from_str::<ConversationSnapshot>(r#"{"durations":{}}"#).is_err());
        assert!(
            serde_json::from_str::<ConversationSnapshot>(
                r#"{"messages":[],"durations":{},"version":2}"#
            )
            .is_ok()
        );
    }

    #[test]
    fn detects_duplicate_ids() {
        let mut snapshot = ConversationSnapshot::empty();
        snapshot
            .messages
            .push(Message::user_text(MessageId::new("x"), "one"));
        assert!(snapshot.duplicate_message_id().is_none());

        snapshot
            .messages
            .push(Message::assistant_text(MessageId::new("x"), "two"));
        assert_eq!(snapshot.duplicate_message_id(), Some(&MessageId::new("x")));
    }

    #[test]
    fn duration_keys_join_id_and_index() {
        assert_eq!(duration_key(&MessageId::new("abc"), 2), "abc-2");
    }
}
