use std::collections::BTreeMap;

/// Elapsed reasoning time per `"{message_id}-{part_index}"` key, in milliseconds.
///
/// Entries are only ever upserted; the whole map is emptied when the conversation is
/// cleared.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DurationTracker {
    entries: BTreeMap<String, f64>,
}

impl DurationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: BTreeMap<String, f64>) -> Self {
        Self { entries }
    }

    /// Upserts `key`. Non-finite and negative values are dropped because they cannot
    /// survive a JSON round trip as numbers.
    pub fn record(&mut self, key: impl Into<String>, duration_ms: f64) -> bool {
        let key = key.into();
        if !duration_ms.is_finite() || duration_ms < 0.0 {
            tracing::warn!(key = %key, duration_ms, "ignoring invalid duration");
            return false;
        }

        self.entries.insert(key, duration_ms);
        true
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.entries.get(key).copied()
    }

    pub fn entries(&self) -> &BTreeMap<String, f64> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
