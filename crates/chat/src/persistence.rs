use finsight_storage::{KeyValueStore, StorageKey};
use snafu::ResultExt;

use crate::error::{
    DecodeSnapshotSnafu, DuplicateMessageIdSnafu, EncodeSnapshotSnafu, PersistenceResult,
    ReadStoreSnafu, WriteStoreSnafu,
};
use crate::snapshot::ConversationSnapshot;

pub const DEFAULT_STORAGE_KEY: &str = "chat-messages";

/// Best-effort durable home of the conversation snapshot.
///
/// Neither operation can fail from the caller's point of view: unreadable data loads as an
/// empty snapshot and failed writes leave the in-memory state authoritative.
pub trait SnapshotPersistence: Send + Sync {
    fn load(&self) -> ConversationSnapshot;
    fn save(&self, snapshot: &ConversationSnapshot);
}

/// Stores the snapshot as JSON under a single fixed key.
#[derive(Debug, Clone)]
pub struct KeyValuePersistence<S> {
    store: S,
    key: StorageKey,
}

impl<S> KeyValuePersistence<S>
where
    S: KeyValueStore,
{
    pub fn new(store: S, key: StorageKey) -> Self {
        Self { store, key }
    }

    pub fn key(&self) -> &StorageKey {
        &self.key
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Strict load: `Ok(None)` when nothing is stored, an error for anything unreadable.
    pub fn try_load(&self) -> PersistenceResult<Option<ConversationSnapshot>> {
        let Some(raw) = self.store.get(&self.key).context(ReadStoreSnafu {
            stage: "snapshot-read",
            key: self.key.to_string(),
        })?
        else {
            return Ok(None);
        };

        let snapshot: ConversationSnapshot =
            serde_json::from_str(&raw).context(DecodeSnapshotSnafu {
                stage: "snapshot-decode",
                key: self.key.to_string(),
            })?;

        if let Some(id) = snapshot.duplicate_message_id() {
            return DuplicateMessageIdSnafu {
                stage: "snapshot-validate",
                key: self.key.to_string(),
                id: id.clone(),
            }
            .fail();
        }

        Ok(Some(snapshot))
    }

    pub fn try_save(&self, snapshot: &ConversationSnapshot) -> PersistenceResult<()> {
        let encoded = serde_json::to_string(snapshot).context(EncodeSnapshotSnafu {
            stage: "snapshot-encode",
        })?;

        self.store.set(&self.key, &encoded).context(WriteStoreSnafu {
            stage: "snapshot-write",
            key: self.key.to_string(),
        })
    }
}

impl<S> SnapshotPersistence for KeyValuePersistence<S>
where
    S: KeyValueStore,
{
    fn load(&self) -> ConversationSnapshot {
        match self.try_load() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                tracing::debug!(key = %self.key, "no stored conversation, starting empty");
                ConversationSnapshot::empty()
            }
            Err(error) => {
                tracing::warn!(
                    key = %self.key,
                    error = %error,
                    "failed to load stored conversation, starting empty"
                );
                ConversationSnapshot::empty()
            }
        }
    }

    fn save(&self, snapshot: &ConversationSnapshot) {
        if let Err(error) = self.try_save(snapshot) {
            tracing::warn!(
                key = %self.key,
                message_count = snapshot.messages.len(),
                error = %error,
                "failed to save conversation; in-memory state stays authoritative"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PersistenceError;
    use crate::message::{Message, MessageId, Part, Role};
    use finsight_storage::{FileStore, MemoryStore};
    use serde_json::{Value, json};

    fn key() -> StorageKey {
        StorageKey::parse(DEFAULT_STORAGE_KEY).unwrap()
    }

    fn sample_snapshot() -> ConversationSnapshot {
        let mut snapshot = ConversationSnapshot::empty();
        snapshot.messages.push(Message::user_text(
            MessageId::new("u-1"),
            "Compare Britannia and Nestle margins",
        ));
        snapshot.messages.push(Message::new(
            MessageId::new("a-1"),
            Role::Assistant,
            vec![
                Part::reasoning("Pulling FY24 reports"),
                Part::text("Nestle leads by 4pp."),
            ],
        ));
        snapshot.durations.insert("a-1-0".to_string(), 812.0);
        snapshot
    }

    #[test]
    fn save_then_load_reproduces_the_snapshot() {
        let persistence = KeyValuePersistence::new(MemoryStore::new(), key());
        let snapshot = sample_snapshot();

        persistence.save(&snapshot);
        assert_eq!(persistence.load(), snapshot);
    }

    #[test]
    fn measured_durations_reload_bit_for_bit() {
        let persistence = KeyValuePersistence::new(MemoryStore::new(), key());
        let mut snapshot = sample_snapshot();
        snapshot
            .durations
            .insert("a-1-0".to_string(), 2123.8429889999998);

        persistence.save(&snapshot);
        assert_eq!(persistence.load(), snapshot);
    }

    #[test]
    fn generated_snapshots_round_trip() {
        let persistence = KeyValuePersistence::new(MemoryStore::new(), key());
        let mut snapshot = every_part_snapshot();

        // xorshift64: deterministic stand-ins for `elapsed().as_secs_f64() * 1000.0`.
        let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
        for index in 0..5_000 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let secs = (state >> 11) as f64 / (1u64 << 53) as f64 * 120.0;
            snapshot
                .durations
                .insert(format!("gen-{index}-0"), secs * 1000.0);
        }
        for (index, edge) in [0.0, f64::MIN_POSITIVE, 5e-324, 0.1 + 0.2, 1.0e15 + 0.5, f64::MAX]
            .into_iter()
            .enumerate()
        {
            snapshot.durations.insert(format!("edge-{index}-0"), edge);
        }

        persistence.save(&snapshot);
        assert_eq!(persistence.load(), snapshot);
    }

    fn every_part_snapshot() -> ConversationSnapshot {
        let mut pending = Message::assistant_empty(MessageId::new("a-tools"));
        pending.push_tool_call(
            "call-1",
            "vectorSearch",
            json!({ "query": "Dabur ₹ margin", "min_score": 0.1 + 0.2, "top_k": 5 }),
        );
        pending.push_tool_call("call-2", "webSearch", json!({ "q": "Emami FY24" }));
        pending.push_tool_call("call-3", "calculator", json!({ "expr": "1/3" }));
        pending.complete_tool_call(
            "call-1",
            json!({ "scores": [0.8123456789012345, 2.5e-8, -7.125], "source": "annual report" }),
        );
        pending.complete_tool_call("call-3", Value::Null);
        pending.append_text("Résumé: 日本語 ✓ 🚀 \"quoted\"\n\tindented");

        let mut snapshot = ConversationSnapshot::empty();
        snapshot.messages.push(Message::user_text(
            MessageId::new("u-ü"),
            "Ça marche? Зарплата 🙂",
        ));
        snapshot.messages.push(Message::new(
            MessageId::new("a-think"),
            Role::Assistant,
            vec![Part::reasoning(""), Part::reasoning("second pass"), Part::text("")],
        ));
        snapshot.messages.push(pending);
        snapshot
    }

    #[test]
    fn missing_key_loads_empty() {
        let persistence = KeyValuePersistence::new(MemoryStore::new(), key());
        assert_eq!(persistence.try_load().unwrap(), None);
        assert_eq!(persistence.load(), ConversationSnapshot::empty());
    }

    #[test]
    fn truncated_json_loads_empty() {
        let store = MemoryStore::new();
        store
            .set(&key(), r#"{"messages":[{"id":"u-1","role":"us"#)
            .unwrap();
        let persistence = KeyValuePersistence::new(store, key());

        assert!(matches!(
            persistence.try_load(),
            Err(PersistenceError::DecodeSnapshot { .. })
        ));
        assert_eq!(persistence.load(), ConversationSnapshot::empty());
    }

    #[test]
    fn schema_mismatch_loads_empty() {
        let store = MemoryStore::new();
        let persistence = KeyValuePersistence::new(store.clone(), key());

        for raw in [r#"{"messages":[]}"#, r#"{"durations":{}}"#, "[]", "42"] {
            store.set(&key(), raw).unwrap();
            assert_eq!(persistence.load(), ConversationSnapshot::empty(), "{raw}");
        }
    }

    #[test]
    fn duplicate_ids_in_storage_load_empty() {
        let store = MemoryStore::new();
        store
            .set(
                &key(),
                r#"{"messages":[
                    {"id":"x","role":"user","parts":[]},
                    {"id":"x","role":"assistant","parts":[]}
                ],"durations":{}}"#,
            )
            .unwrap();
        let persistence = KeyValuePersistence::new(store, key());

        assert!(matches!(
            persistence.try_load(),
            Err(PersistenceError::DuplicateMessageId { .. })
        ));
        assert!(persistence.load().is_empty());
    }

    #[test]
    fn failed_save_is_swallowed_and_keeps_previous_value() {
        let store = MemoryStore::new().with_quota(64);
        let persistence = KeyValuePersistence::new(store, key());

        persistence.save(&ConversationSnapshot::empty());
        persistence.save(&sample_snapshot());

        assert!(matches!(
            persistence.try_save(&sample_snapshot()),
            Err(PersistenceError::WriteStore { .. })
        ));
        assert_eq!(persistence.load(), ConversationSnapshot::empty());
    }

    #[test]
    fn file_backed_round_trip_survives_a_new_adapter() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = sample_snapshot();

        KeyValuePersistence::new(FileStore::new(dir.path()), key()).save(&snapshot);
        let reopened = KeyValuePersistence::new(FileStore::new(dir.path()), key());

        assert_eq!(reopened.load(), snapshot);
    }
}
