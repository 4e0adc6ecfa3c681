//! Pinned mini-timers.
//!
//! A [`PinnedTimerHandle`] names a record by store key and kind; the adapter
//! drives it through the generic [`Clocked`] interface without a
//! [`TimerSession`](crate::timer::TimerSession). A handle with a `subId`
//! addresses one sub-timer of a `multi` record: only that entry of the
//! stored `timers` map is rewritten, siblings stay byte for byte as they were.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::controller::Collaborators;
use crate::effects::play_signal;
use crate::events::{at, Event};
use crate::stats::stats_entry;
use crate::storage::RecordStore;
use crate::timer::{
    apply_completion, format_clock, nominal_duration, policy, Clocked, CompletionOutcome,
    Display, SegmentId, SignalPrefs, SignalTracker, SubTimer, TimerBody, TimerKind, TimerRecord,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinnedTimerHandle {
    /// Store key of the record.
    pub id: String,
    pub kind: TimerKind,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_id: Option<String>,
}

impl PinnedTimerHandle {
    pub fn new(id: impl Into<String>, kind: TimerKind, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            display_name: display_name.into(),
            sub_id: None,
        }
    }

    pub fn with_sub(mut self, sub_id: impl Into<String>) -> Self {
        self.sub_id = Some(sub_id.into());
        self
    }

    /// Unique per pinned clock.
    pub fn pin_key(&self) -> String {
        match &self.sub_id {
            Some(sub) => format!("{}#{sub}", self.id),
            None => self.id.clone(),
        }
    }

    fn segment(&self) -> SegmentId {
        match (self.kind, &self.sub_id) {
            (TimerKind::Multi, Some(sub)) => SegmentId::Sub(sub.clone()),
            _ => SegmentId::Root,
        }
    }
}

/// What an adapter command does to each addressed clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Pause,
    Reset,
}

/// A record loaded on behalf of one handle.
struct Target {
    key: String,
    segment: SegmentId,
    record: TimerRecord,
    raw: Option<String>,
}

impl Target {
    fn load(store: &RecordStore, handle: &PinnedTimerHandle) -> Self {
        let loaded = store.load(&handle.id, handle.kind);
        Self {
            key: handle.id.clone(),
            segment: handle.segment(),
            record: loaded.decoded.record,
            raw: loaded.raw,
        }
    }

    /// The clocks a command on this handle touches. The root of a `multi`
    /// record stands for all of its sub-timers.
    fn segments(&self) -> Vec<SegmentId> {
        match (&self.record.body, &self.segment) {
            (TimerBody::Multi(_), SegmentId::Root) => self.record.body.segment_ids(),
            _ => vec![self.segment.clone()],
        }
    }

    fn clock(&self) -> Option<&dyn Clocked> {
        self.record.body.clock(&self.segment)
    }

    fn display(&self, now: i64) -> Option<Display> {
        self.record.body.display(&self.segment, now)
    }

    /// Complete every addressed clock that ran out while nobody was looking.
    fn settle(&mut self, now: i64) -> Vec<Event> {
        let mut events = Vec::new();
        for segment in self.segments() {
            let expired = self
                .record
                .body
                .clock(&segment)
                .is_some_and(|clock| clock.is_running() && clock.display_ms(now) == 0);
            if expired {
                events.extend(complete(&mut self.record, &segment, now));
            }
        }
        events
    }

    fn apply(&mut self, command: Command, now: i64) -> Vec<Event> {
        let kind = self.record.kind();
        let mut events = Vec::new();
        for segment in self.segments() {
            let Some(clock) = self.record.body.clock_mut(&segment) else {
                continue;
            };
            let label = segment.sub_id().map(str::to_string);
            let event = match command {
                Command::Start => clock.start(now).then(|| Event::TimerStarted {
                    kind,
                    segment: label,
                    value_ms: clock.display_ms(now),
                    at: at(now),
                }),
                Command::Pause => clock.pause(now).then(|| Event::TimerPaused {
                    kind,
                    segment: label,
                    value_ms: clock.display_ms(now),
                    at: at(now),
                }),
                Command::Reset => clock.reset().then(|| Event::TimerReset {
                    kind,
                    segment: label,
                    at: at(now),
                }),
            };
            events.extend(event);
        }
        events
    }

    fn save(&self, store: &RecordStore) -> bool {
        match (&self.segment, &self.record.body) {
            (SegmentId::Sub(id), TimerBody::Multi(multi)) => match multi.timers.get(id) {
                Some(sub) => splice(store, &self.key, self.raw.as_deref(), id, sub),
                None => false,
            },
            _ => store.save(&self.key, &self.record).is_some(),
        }
    }

    /// Write back if `events` changed the record, then hand the events to
    /// the collaborators.
    fn commit(&self, store: &RecordStore, collaborators: &Collaborators, events: &[Event]) {
        if events.iter().any(Event::mutates_record) && !self.save(store) {
            debug!(key = %self.key, segment = %self.segment, "pinned change not written back");
        }
        deliver(collaborators, events, self.record.signal);
    }
}

/// Apply the kind's completion policy to one clock that reached zero.
fn complete(record: &mut TimerRecord, segment: &SegmentId, now: i64) -> Vec<Event> {
    let kind_policy = record.policy();
    let duration_ms = nominal_duration(&record.body, segment);
    let Some(outcome) = apply_completion(&mut record.body, segment, kind_policy.completion, now)
    else {
        return Vec::new();
    };
    let label = segment.sub_id().map(str::to_string);
    let mut events = Vec::new();
    if let Some(pattern) = kind_policy.completion_pattern() {
        events.push(Event::TimerCompleted {
            kind: kind_policy.kind,
            segment: label,
            pattern,
            duration_ms,
            at: at(now),
        });
    }
    if let CompletionOutcome::Rearmed { cycles, end_at } = outcome {
        events.push(Event::CycleRearmed {
            kind: kind_policy.kind,
            cycles,
            end_at,
            at: at(now),
        });
    }
    events
}

fn deliver(collaborators: &Collaborators, events: &[Event], signal: SignalPrefs) {
    for event in events {
        if event.is_signal() {
            play_signal(collaborators.effects.as_ref(), event, signal);
        }
        if let Some((kind, action, duration_ms)) = stats_entry(event) {
            collaborators.stats.record(kind, action, duration_ms);
        }
    }
}

/// Replace `timers[id]` inside the stored JSON and write it back.
fn splice(
    store: &RecordStore,
    key: &str,
    raw: Option<&str>,
    id: &str,
    sub: &SubTimer,
) -> bool {
    let mut value: Value = match raw.map(serde_json::from_str) {
        Some(Ok(value)) => value,
        _ => {
            debug!(key, sub = id, "no stored record to splice into");
            return false;
        }
    };
    let Some(timers) = value.get_mut("timers").and_then(Value::as_object_mut) else {
        warn!(key, sub = id, "stored record has no timers map");
        return false;
    };
    match serde_json::to_value(sub) {
        Ok(entry) => {
            timers.insert(id.to_string(), entry);
        }
        Err(e) => {
            warn!(key, sub = id, error = %e, "encoding sub-timer failed");
            return false;
        }
    }
    store.save_raw(key, &value.to_string())
}

/// Load the handle's record with expired clocks already completed, written
/// back and signalled.
fn load_settled(
    store: &RecordStore,
    handle: &PinnedTimerHandle,
    collaborators: &Collaborators,
    now: i64,
) -> (Target, Vec<Event>) {
    let mut target = Target::load(store, handle);
    let events = target.settle(now);
    target.commit(store, collaborators, &events);
    (target, events)
}

fn run(
    store: &RecordStore,
    handle: &PinnedTimerHandle,
    collaborators: &Collaborators,
    now: i64,
    command: Command,
) -> Vec<Event> {
    let (mut target, mut events) = load_settled(store, handle, collaborators, now);
    let applied = target.apply(command, now);
    target.commit(store, collaborators, &applied);
    events.extend(applied);
    events
}

/// Current display of the handle's clock. A clock that ran out since it was
/// last looked at is completed first, so it never shows as running at zero.
pub fn display(
    store: &RecordStore,
    handle: &PinnedTimerHandle,
    collaborators: &Collaborators,
    now: i64,
) -> Option<Display> {
    load_settled(store, handle, collaborators, now).0.display(now)
}

/// Start the clock and write it back. Returns every event produced,
/// including completions settled on the way in; the command changed nothing
/// if none of them is a [`Event::TimerStarted`].
pub fn start(
    store: &RecordStore,
    handle: &PinnedTimerHandle,
    collaborators: &Collaborators,
    now: i64,
) -> Vec<Event> {
    run(store, handle, collaborators, now, Command::Start)
}

pub fn pause(
    store: &RecordStore,
    handle: &PinnedTimerHandle,
    collaborators: &Collaborators,
    now: i64,
) -> Vec<Event> {
    run(store, handle, collaborators, now, Command::Pause)
}

pub fn reset(
    store: &RecordStore,
    handle: &PinnedTimerHandle,
    collaborators: &Collaborators,
    now: i64,
) -> Vec<Event> {
    run(store, handle, collaborators, now, Command::Reset)
}

/// One row of the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PinnedView {
    pub handle: PinnedTimerHandle,
    pub display: Option<Display>,
    pub formatted: String,
}

/// The list of pinned handles, stored under its own key, plus the signal
/// trackers for the pins it drives.
pub struct PinnedBoard {
    store: RecordStore,
    board_key: String,
    pins: Vec<PinnedTimerHandle>,
    trackers: HashMap<String, SignalTracker>,
    collaborators: Collaborators,
}

impl PinnedBoard {
    pub fn open(store: RecordStore, board_key: &str, collaborators: Collaborators) -> Self {
        let pins = match store.read_raw(board_key) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(key = board_key, error = %e, "pin list unreadable, starting empty");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(key = board_key, error = %e, "reading pin list failed");
                Vec::new()
            }
        };
        Self {
            store,
            board_key: board_key.to_string(),
            pins,
            trackers: HashMap::new(),
            collaborators,
        }
    }

    pub fn pins(&self) -> &[PinnedTimerHandle] {
        &self.pins
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn find(&self, pin_key: &str) -> Option<&PinnedTimerHandle> {
        self.pins.iter().find(|p| p.pin_key() == pin_key)
    }

    /// Add a handle. Returns `false` if the same clock is already pinned.
    pub fn pin(&mut self, handle: PinnedTimerHandle) -> bool {
        if self.find(&handle.pin_key()).is_some() {
            return false;
        }
        self.pins.push(handle);
        self.persist();
        true
    }

    pub fn unpin(&mut self, pin_key: &str) -> bool {
        let before = self.pins.len();
        self.pins.retain(|p| p.pin_key() != pin_key);
        if self.pins.len() == before {
            return false;
        }
        self.trackers.remove(pin_key);
        self.persist();
        true
    }

    /// Every pin with its current display. Pins whose clock ran out are
    /// completed first.
    pub fn views(&mut self, now: i64) -> Vec<PinnedView> {
        let pins = self.pins.clone();
        pins.into_iter()
            .map(|handle| {
                let (target, settled) =
                    load_settled(&self.store, &handle, &self.collaborators, now);
                if !settled.is_empty() {
                    self.trackers.remove(&handle.pin_key());
                }
                let display = target.display(now);
                let formatted = display
                    .map(|d| format_clock(&d, policy(handle.kind).granularity))
                    .unwrap_or_else(|| "--:--".to_string());
                PinnedView {
                    handle,
                    display,
                    formatted,
                }
            })
            .collect()
    }

    pub fn start(&mut self, pin_key: &str, now: i64) -> Option<Vec<Event>> {
        self.command(pin_key, now, Command::Start)
    }

    pub fn pause(&mut self, pin_key: &str, now: i64) -> Option<Vec<Event>> {
        self.command(pin_key, now, Command::Pause)
    }

    pub fn reset(&mut self, pin_key: &str, now: i64) -> Option<Vec<Event>> {
        self.command(pin_key, now, Command::Reset)
    }

    /// `None` if nothing is pinned under `pin_key`.
    fn command(&mut self, pin_key: &str, now: i64, command: Command) -> Option<Vec<Event>> {
        let handle = self.find(pin_key)?.clone();
        let events = run(&self.store, &handle, &self.collaborators, now, command);
        if !events.is_empty() {
            self.trackers.remove(pin_key);
        }
        Some(events)
    }

    /// Re-read every pinned record, fire the signals its clock crossed, and
    /// complete clocks that reached zero.
    pub fn refresh(&mut self, now: i64) -> Vec<Event> {
        let mut events = Vec::new();
        for handle in self.pins.clone() {
            let first = events.len();
            let Some(signal) = self.refresh_pin(&handle, now, &mut events) else {
                continue;
            };
            deliver(&self.collaborators, &events[first..], signal);
        }
        events
    }

    /// Returns the pin's signal preferences when it is running.
    fn refresh_pin(
        &mut self,
        handle: &PinnedTimerHandle,
        now: i64,
        events: &mut Vec<Event>,
    ) -> Option<SignalPrefs> {
        let pin_key = handle.pin_key();
        let mut target = Target::load(&self.store, handle);
        let kind_policy = policy(handle.kind);
        let window = kind_policy.last_seconds_window_ms;
        let segment_label = handle.sub_id.clone();

        let signal = target.record.signal;
        let Some(clock) = target.clock() else {
            self.trackers.remove(&pin_key);
            return None;
        };
        if !clock.is_running() || kind_policy.completion_pattern().is_none() {
            self.trackers.remove(&pin_key);
            return None;
        }
        let remaining_ms = clock.display_ms(now);
        let warn_at_ms = clock.warn_at_ms();
        let crossings = self
            .trackers
            .entry(pin_key.clone())
            .or_insert_with(|| {
                let mut tracker = SignalTracker::new();
                tracker.prime(remaining_ms, warn_at_ms, window);
                tracker
            })
            .observe(remaining_ms, warn_at_ms, window);

        if crossings.warning {
            events.push(Event::WarningReached {
                kind: handle.kind,
                segment: segment_label.clone(),
                remaining_ms,
                at: at(now),
            });
        }
        if let Some(second) = crossings.tick {
            events.push(Event::LastSecondsTick {
                kind: handle.kind,
                segment: segment_label,
                second,
                at: at(now),
            });
        }
        if !crossings.completed {
            return Some(signal);
        }

        let segment = target.segment.clone();
        let completed = complete(&mut target.record, &segment, now);
        if !completed.is_empty() && !target.save(&self.store) {
            debug!(pin = %pin_key, "completed pin not written back");
        }
        events.extend(completed);
        if let Some(tracker) = self.trackers.get_mut(&pin_key) {
            tracker.reset();
        }
        Some(signal)
    }

    fn persist(&self) {
        match serde_json::to_string(&self.pins) {
            Ok(raw) => {
                self.store.save_raw(&self.board_key, &raw);
            }
            Err(e) => warn!(key = %self.board_key, error = %e, "encoding pin list failed"),
        }
    }
}
