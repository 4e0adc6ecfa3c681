//! One tab's live view of one timer record.
//!
//! A [`TimerController`] ties the pieces together for a key: it loads the
//! record, owns the session, writes changes back through the debounced
//! writer, re-seeds from other tabs, and hands signals to the effect emitter
//! and stats collector. Dropping it flushes pending writes; the logical
//! running state stays in the store for the next viewer.

use std::sync::Arc;

use tracing::{info, warn};

use crate::effects::{play_signal, EffectEmitter, SilentEffects};
use crate::events::Event;
use crate::render_loop::LoopSlot;
use crate::stats::{stats_entry, NoStats, StatsCollector};
use crate::storage::{Config, DebouncedWriter, DecodeOutcome, RecordStore};
use crate::sync::{RecordWatcher, RemoteChange};
use crate::timer::{Action, Display, SegmentId, TimerKind, TimerRecord, TimerSession};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerOptions {
    pub debounce_ms: u64,
    pub poll_interval_ms: u64,
    pub last_seconds_window_ms: u64,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ControllerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            debounce_ms: config.debounce_ms,
            poll_interval_ms: config.poll_interval_ms,
            last_seconds_window_ms: config.last_seconds_window_ms,
        }
    }
}

/// Outputs the engine reports to.
#[derive(Clone)]
pub struct Collaborators {
    pub effects: Arc<dyn EffectEmitter>,
    pub stats: Arc<dyn StatsCollector>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            effects: Arc::new(SilentEffects),
            stats: Arc::new(NoStats),
        }
    }
}

pub struct TimerController {
    key: String,
    session: TimerSession,
    store: RecordStore,
    writer: DebouncedWriter,
    watcher: RecordWatcher,
    collaborators: Collaborators,
    loop_slot: LoopSlot,
}

impl TimerController {
    /// Load the record under `key` and settle it at `now`: a clock that ran
    /// out while nobody was watching completes here, before anything is
    /// displayed.
    pub fn open(
        key: &str,
        kind: TimerKind,
        store: RecordStore,
        collaborators: Collaborators,
        options: &ControllerOptions,
        now: i64,
    ) -> Self {
        let feed = store.subscribe();
        let loaded = store.load(key, kind);
        let mut watcher =
            RecordWatcher::new(key, store.tab().clone(), feed, options.poll_interval_ms);
        watcher.observe_local(loaded.raw);

        let session = TimerSession::new(loaded.decoded.record, now)
            .with_tick_window(options.last_seconds_window_ms, now);
        let mut controller = Self {
            key: key.to_string(),
            session,
            store,
            writer: DebouncedWriter::new(options.debounce_ms),
            watcher,
            collaborators,
            loop_slot: LoopSlot::default(),
        };
        let events = controller.session.tick(now);
        controller.after(&events, now);
        controller.flush_due(now);
        controller
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> TimerKind {
        self.session.kind()
    }

    pub fn record(&self) -> &TimerRecord {
        self.session.record()
    }

    pub fn session(&self) -> &TimerSession {
        &self.session
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn is_running(&self) -> bool {
        self.session.is_running()
    }

    pub fn display(&self, segment: &SegmentId, now: i64) -> Option<Display> {
        self.session.display(segment, now)
    }

    pub fn pending_write(&self) -> Option<&str> {
        self.writer.pending(&self.key)
    }

    pub fn loop_slot(&self) -> &LoopSlot {
        &self.loop_slot
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Apply a user action. The change is visible in memory at once and
    /// reaches the store after the debounce delay.
    pub fn dispatch(&mut self, action: Action, now: i64) -> Vec<Event> {
        let events = self.session.apply(action, now);
        self.after(&events, now);
        self.flush_due(now);
        events
    }

    /// One scheduling step: pick up other tabs' writes, observe the clocks,
    /// and write out whatever is due.
    pub fn tick(&mut self, now: i64) -> Vec<Event> {
        let mut events = Vec::new();
        if let Some(change) = self.watcher.poll(&self.store, now) {
            events.push(self.reseed(change, now));
        }
        let ticked = self.session.tick(now);
        self.after(&ticked, now);
        events.extend(ticked);
        self.flush_due(now);
        events
    }

    /// Write every pending change now.
    pub fn flush(&mut self) {
        for (key, raw) in self.writer.drain() {
            self.write(&key, raw);
        }
    }

    /// Tear down: flush and release.
    pub fn close(mut self) {
        self.flush();
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn reseed(&mut self, change: RemoteChange, now: i64) -> Event {
        // Last write wins: our unsaved change loses to theirs.
        self.writer.cancel(&self.key);
        let kind = self.kind();
        let codec = *self.store.codec();
        let record = match change {
            RemoteChange::Replaced(raw) => {
                let decoded = codec.decode(Some(&raw), kind);
                if let DecodeOutcome::Defaulted(reason) = &decoded.outcome {
                    warn!(key = %self.key, %reason, "remote record unusable, using default");
                }
                decoded.record
            }
            RemoteChange::Removed => codec.default_record(kind),
        };
        info!(key = %self.key, running = record.is_running(), "re-seeded from another tab");
        self.session.replace(record, now)
    }

    fn after(&mut self, events: &[Event], now: i64) {
        if events.is_empty() {
            return;
        }
        if events.iter().any(Event::mutates_record) {
            match self.store.codec().encode(self.session.record()) {
                Ok(raw) => self.writer.schedule(&self.key, raw, now),
                Err(e) => warn!(key = %self.key, error = %e, "encoding record failed"),
            }
        }
        let signal = self.session.record().signal;
        for event in events {
            if event.is_signal() {
                play_signal(self.collaborators.effects.as_ref(), event, signal);
            }
            if let Some((kind, action, duration_ms)) = stats_entry(event) {
                self.collaborators.stats.record(kind, action, duration_ms);
            }
        }
    }

    fn flush_due(&mut self, now: i64) {
        for (key, raw) in self.writer.take_due(now) {
            self.write(&key, raw);
        }
    }

    fn write(&mut self, key: &str, raw: String) {
        if self.store.save_raw(key, &raw) && key == self.key {
            self.watcher.observe_local(Some(raw));
        }
    }
}

impl Drop for TimerController {
    fn drop(&mut self) {
        self.flush();
    }
}
