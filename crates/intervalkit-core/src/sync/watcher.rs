//! Change detection for one record key.
//!
//! Two sources feed the watcher: the store's broadcast feed, when it has one,
//! and a poll of the raw value every `poll_interval_ms`. Both compare against
//! the last raw value this tab wrote or saw, so a tab never re-seeds from its
//! own write. A failed read is never reported as a removal.

use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::debug;

use super::TabId;
use crate::storage::{RecordStore, StorageEvent};

/// What another tab did to the watched key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteChange {
    Replaced(String),
    Removed,
}

pub struct RecordWatcher {
    key: String,
    tab: TabId,
    feed: Option<broadcast::Receiver<StorageEvent>>,
    last_seen: Option<String>,
    poll_interval_ms: u64,
    next_poll_at: Option<i64>,
}

impl RecordWatcher {
    pub fn new(
        key: &str,
        tab: TabId,
        feed: Option<broadcast::Receiver<StorageEvent>>,
        poll_interval_ms: u64,
    ) -> Self {
        Self {
            key: key.to_string(),
            tab,
            feed,
            last_seen: None,
            poll_interval_ms,
            next_poll_at: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn last_seen(&self) -> Option<&str> {
        self.last_seen.as_deref()
    }

    /// Remember a value this tab loaded or wrote itself.
    pub fn observe_local(&mut self, raw: Option<String>) {
        self.last_seen = raw;
    }

    /// Check both sources. Returns at most one change: the latest one.
    pub fn poll(&mut self, store: &RecordStore, now: i64) -> Option<RemoteChange> {
        let (pushed, lagged) = self.drain_feed();
        if let Some(value) = pushed {
            if let Some(change) = self.accept(value) {
                return Some(change);
            }
        }

        let due = self.next_poll_at.map_or(true, |at| now >= at);
        if !(due || lagged) || store.is_degraded() {
            return None;
        }
        self.next_poll_at = Some(now.saturating_add(self.poll_interval_ms as i64));
        match store.read_raw(&self.key) {
            // The read itself knocked the store over; the fallback knows
            // nothing about other tabs.
            Ok(_) if store.is_degraded() => None,
            Ok(value) => self.accept(value),
            Err(e) => {
                debug!(key = %self.key, error = %e, "poll read failed");
                None
            }
        }
    }

    /// Latest foreign value from the feed, and whether messages were lost.
    fn drain_feed(&mut self) -> (Option<Option<String>>, bool) {
        let mut latest = None;
        let mut lagged = false;
        let Some(feed) = self.feed.as_mut() else {
            return (None, false);
        };
        loop {
            match feed.try_recv() {
                Ok(event) => {
                    if event.key == self.key && event.origin != self.tab {
                        latest = Some(event.value);
                    }
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    debug!(key = %self.key, skipped, "change feed lagged, polling");
                    lagged = true;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Closed) => {
                    self.feed = None;
                    break;
                }
            }
        }
        (latest, lagged)
    }

    fn accept(&mut self, value: Option<String>) -> Option<RemoteChange> {
        if value == self.last_seen {
            return None;
        }
        self.last_seen = value.clone();
        Some(match value {
            Some(raw) => RemoteChange::Replaced(raw),
            None => RemoteChange::Removed,
        })
    }
}
