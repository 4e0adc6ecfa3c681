use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{BeepPattern, Side, SignalPrefs, TimerKind};

/// Every state change in the engine produces an Event.
/// The UI renders from them; effects and stats subscribe to them.
///
/// `segment` is `None` for the record itself and the sub-timer id inside a
/// `multi` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        kind: TimerKind,
        segment: Option<String>,
        value_ms: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        kind: TimerKind,
        segment: Option<String>,
        value_ms: u64,
        at: DateTime<Utc>,
    },
    TimerReset {
        kind: TimerKind,
        segment: Option<String>,
        at: DateTime<Utc>,
    },
    TimerAdjusted {
        kind: TimerKind,
        segment: Option<String>,
        value_ms: u64,
        at: DateTime<Utc>,
    },
    DurationChanged {
        kind: TimerKind,
        segment: Option<String>,
        duration_ms: u64,
        at: DateTime<Utc>,
    },
    WarnAtChanged {
        kind: TimerKind,
        segment: Option<String>,
        warn_at_ms: Option<u64>,
        at: DateTime<Utc>,
    },
    /// Remaining time dropped to or below the warning threshold.
    WarningReached {
        kind: TimerKind,
        segment: Option<String>,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    /// A whole second started inside the last-seconds window.
    LastSecondsTick {
        kind: TimerKind,
        segment: Option<String>,
        second: u64,
        at: DateTime<Utc>,
    },
    TimerCompleted {
        kind: TimerKind,
        segment: Option<String>,
        pattern: BeepPattern,
        duration_ms: u64,
        at: DateTime<Utc>,
    },
    /// A repeating interval finished and started over.
    CycleRearmed {
        kind: TimerKind,
        cycles: u64,
        end_at: i64,
        at: DateTime<Utc>,
    },
    LapRecorded {
        lap_index: usize,
        split_ms: u64,
        at: DateTime<Utc>,
    },
    SideSwitched {
        active: Side,
        at: DateTime<Utc>,
    },
    SignalPrefsChanged {
        signal: SignalPrefs,
        at: DateTime<Utc>,
    },
    SubTimerAdded {
        id: String,
        name: String,
        duration_ms: u64,
        at: DateTime<Utc>,
    },
    SubTimerRemoved {
        id: String,
        at: DateTime<Utc>,
    },
    /// Another tab wrote this record; local state was replaced wholesale.
    RecordReplaced {
        kind: TimerKind,
        running: bool,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Whether this event is a one-shot signal (warning, tick, completion).
    pub fn is_signal(&self) -> bool {
        matches!(
            self,
            Event::WarningReached { .. }
                | Event::LastSecondsTick { .. }
                | Event::TimerCompleted { .. }
        )
    }

    /// Whether this tab changed its record and must write it back.
    pub fn mutates_record(&self) -> bool {
        !matches!(
            self,
            Event::WarningReached { .. }
                | Event::LastSecondsTick { .. }
                | Event::RecordReplaced { .. }
        )
    }
}

/// Event timestamp for an epoch-millisecond instant.
pub fn at(now_ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(now_ms).unwrap_or_default()
}
