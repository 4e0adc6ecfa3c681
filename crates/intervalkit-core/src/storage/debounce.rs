//! Debounced writes.
//!
//! A write waits `delay_ms` after it was scheduled. Scheduling again for the
//! same key replaces the pending value and restarts the delay; values are
//! never merged.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingWrite {
    raw: String,
    due_at: i64,
}

#[derive(Debug, Clone)]
pub struct DebouncedWriter {
    delay_ms: u64,
    pending: HashMap<String, PendingWrite>,
}

impl DebouncedWriter {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            pending: HashMap::new(),
        }
    }

    /// Queue `raw` for `key`, superseding any pending write for it.
    pub fn schedule(&mut self, key: &str, raw: String, now: i64) {
        let due_at = now.saturating_add(i64::try_from(self.delay_ms).unwrap_or(i64::MAX));
        self.pending
            .insert(key.to_string(), PendingWrite { raw, due_at });
    }

    /// Remove and return every write whose delay has passed.
    pub fn take_due(&mut self, now: i64) -> Vec<(String, String)> {
        let mut ready = Vec::new();
        self.pending.retain(|key, pending| {
            if pending.due_at <= now {
                ready.push((key.clone(), std::mem::take(&mut pending.raw)));
                false
            } else {
                true
            }
        });
        ready.sort();
        ready
    }

    /// Remove and return every pending write regardless of its delay.
    pub fn drain(&mut self) -> Vec<(String, String)> {
        let mut all: Vec<(String, String)> = self
            .pending
            .drain()
            .map(|(key, pending)| (key, pending.raw))
            .collect();
        all.sort();
        all
    }

    /// Drop the pending write for `key`. Returns whether there was one.
    pub fn cancel(&mut self, key: &str) -> bool {
        self.pending.remove(key).is_some()
    }

    pub fn pending(&self, key: &str) -> Option<&str> {
        self.pending.get(key).map(|p| p.raw.as_str())
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
