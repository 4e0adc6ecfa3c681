//! Per-kind policy table.
//!
//! Every kind is described by one static [`KindPolicy`]: legal ranges, field
//! names, completion behavior, display granularity and signal windows. The
//! clock, signal machine and codec read these instead of branching on page
//! specifics.

use serde::{Deserialize, Serialize};

use super::record::{
    CountdownBody, CycleBody, DualClockBody, MultiBody, SignalPrefs, StopwatchBody, TimerBody,
    TimerKind, TimerMode, TimerRecord,
};

/// Signal defaults for a brand-new record.
pub const FIRST_RUN_SIGNAL: SignalPrefs = SignalPrefs::ON;

/// Signal defaults for fields missing from a stored or imported record.
pub const MISSING_SIGNAL: SignalPrefs = SignalPrefs::OFF;

const SECOND_MS: u64 = 1_000;
const MINUTE_MS: u64 = 60 * SECOND_MS;
const HOUR_MS: u64 = 60 * MINUTE_MS;

/// What happens when a countdown-like clock reaches zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionPolicy {
    /// Stop the clock at zero.
    Stop,
    /// Re-arm for another interval and count the cycle.
    Rearm,
    /// Stop the whole record (both sides of a dual clock).
    StopAll,
    /// Counting up never completes.
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeepPattern {
    Multi,
    Single,
}

/// The smallest change the UI shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Seconds,
    Centiseconds,
}

impl Granularity {
    pub fn step_ms(self) -> u64 {
        match self {
            Granularity::Seconds => 1_000,
            Granularity::Centiseconds => 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindPolicy {
    pub kind: TimerKind,
    pub mode: TimerMode,
    pub schema_version: u32,
    /// Persisted name of the nominal length field, empty for count-up.
    pub duration_field: &'static str,
    pub min_duration_ms: u64,
    /// Upper bound of the nominal length; for count-up, of the elapsed time.
    pub max_duration_ms: u64,
    pub default_duration_ms: u64,
    pub completion: CompletionPolicy,
    pub granularity: Granularity,
    pub last_seconds_window_ms: Option<u64>,
    pub max_sub_timers: usize,
    pub max_laps: usize,
}

static COUNTDOWN: KindPolicy = KindPolicy {
    kind: TimerKind::Countdown,
    mode: TimerMode::Countdown,
    schema_version: 1,
    duration_field: "durationMs",
    min_duration_ms: SECOND_MS,
    max_duration_ms: 99 * HOUR_MS + 59 * MINUTE_MS + 59 * SECOND_MS,
    default_duration_ms: 5 * MINUTE_MS,
    completion: CompletionPolicy::Stop,
    granularity: Granularity::Seconds,
    last_seconds_window_ms: Some(10 * SECOND_MS),
    max_sub_timers: 0,
    max_laps: 0,
};

static ANALOG: KindPolicy = KindPolicy {
    kind: TimerKind::Analog,
    mode: TimerMode::Countdown,
    schema_version: 1,
    duration_field: "durationMs",
    min_duration_ms: SECOND_MS,
    max_duration_ms: HOUR_MS,
    default_duration_ms: 15 * MINUTE_MS,
    completion: CompletionPolicy::Stop,
    granularity: Granularity::Seconds,
    last_seconds_window_ms: Some(10 * SECOND_MS),
    max_sub_timers: 0,
    max_laps: 0,
};

static STOPWATCH: KindPolicy = KindPolicy {
    kind: TimerKind::Stopwatch,
    mode: TimerMode::CountUp,
    schema_version: 1,
    duration_field: "",
    min_duration_ms: 0,
    max_duration_ms: 99 * HOUR_MS + 59 * MINUTE_MS + 59 * SECOND_MS + 990,
    default_duration_ms: 0,
    completion: CompletionPolicy::Never,
    granularity: Granularity::Centiseconds,
    last_seconds_window_ms: None,
    max_sub_timers: 0,
    max_laps: 999,
};

static CYCLE: KindPolicy = KindPolicy {
    kind: TimerKind::Cycle,
    mode: TimerMode::RepeatingInterval,
    schema_version: 1,
    duration_field: "intervalMs",
    min_duration_ms: SECOND_MS,
    max_duration_ms: 24 * HOUR_MS,
    default_duration_ms: MINUTE_MS,
    completion: CompletionPolicy::Rearm,
    granularity: Granularity::Seconds,
    last_seconds_window_ms: Some(10 * SECOND_MS),
    max_sub_timers: 0,
    max_laps: 0,
};

static DUAL_CLOCK: KindPolicy = KindPolicy {
    kind: TimerKind::DualClock,
    mode: TimerMode::DualClock,
    schema_version: 1,
    duration_field: "durationMs",
    min_duration_ms: SECOND_MS,
    max_duration_ms: 3 * HOUR_MS,
    default_duration_ms: 5 * MINUTE_MS,
    completion: CompletionPolicy::StopAll,
    granularity: Granularity::Seconds,
    last_seconds_window_ms: Some(10 * SECOND_MS),
    max_sub_timers: 0,
    max_laps: 0,
};

// Version 2: sub-timers moved from an array to a map keyed by sub id.
static MULTI: KindPolicy = KindPolicy {
    kind: TimerKind::Multi,
    mode: TimerMode::Countdown,
    schema_version: 2,
    duration_field: "durationMs",
    min_duration_ms: SECOND_MS,
    max_duration_ms: 24 * HOUR_MS,
    default_duration_ms: 5 * MINUTE_MS,
    completion: CompletionPolicy::Stop,
    granularity: Granularity::Seconds,
    last_seconds_window_ms: Some(10 * SECOND_MS),
    max_sub_timers: 12,
    max_laps: 0,
};

pub fn policy(kind: TimerKind) -> &'static KindPolicy {
    match kind {
        TimerKind::Countdown => &COUNTDOWN,
        TimerKind::Analog => &ANALOG,
        TimerKind::Stopwatch => &STOPWATCH,
        TimerKind::Cycle => &CYCLE,
        TimerKind::DualClock => &DUAL_CLOCK,
        TimerKind::Multi => &MULTI,
    }
}

impl KindPolicy {
    /// Clamp a nominal length into this kind's legal range.
    pub fn clamp_duration(&self, duration_ms: u64) -> u64 {
        duration_ms.clamp(self.min_duration_ms, self.max_duration_ms)
    }

    pub fn completion_pattern(&self) -> Option<BeepPattern> {
        match self.completion {
            CompletionPolicy::Stop | CompletionPolicy::StopAll => Some(BeepPattern::Multi),
            CompletionPolicy::Rearm => Some(BeepPattern::Single),
            CompletionPolicy::Never => None,
        }
    }

    pub fn default_body(&self) -> TimerBody {
        let duration = self.default_duration_ms;
        match self.kind {
            TimerKind::Countdown => TimerBody::Countdown(CountdownBody::new(duration)),
            TimerKind::Analog => TimerBody::Analog(CountdownBody::new(duration)),
            TimerKind::Stopwatch => TimerBody::Stopwatch(StopwatchBody::new()),
            TimerKind::Cycle => TimerBody::Cycle(CycleBody::new(duration)),
            TimerKind::DualClock => TimerBody::DualClock(DualClockBody::new(duration)),
            TimerKind::Multi => TimerBody::Multi(MultiBody::default()),
        }
    }

    /// The record a first visit starts from.
    pub fn default_record(&self, signal: SignalPrefs) -> TimerRecord {
        TimerRecord::new(self.default_body(), signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_matching_policy() {
        for kind in TimerKind::ALL {
            let p = policy(kind);
            assert_eq!(p.kind, kind);
            assert_eq!(p.default_body().kind(), kind);
            assert!(p.min_duration_ms <= p.max_duration_ms);
        }
    }

    #[test]
    fn clamp_duration_respects_range() {
        let p = policy(TimerKind::Analog);
        assert_eq!(p.clamp_duration(0), 1_000);
        assert_eq!(p.clamp_duration(2 * HOUR_MS), HOUR_MS);
        assert_eq!(p.clamp_duration(90_000), 90_000);
    }

    #[test]
    fn cycle_uses_single_beep() {
        assert_eq!(
            policy(TimerKind::Cycle).completion_pattern(),
            Some(BeepPattern::Single)
        );
        assert_eq!(
            policy(TimerKind::Countdown).completion_pattern(),
            Some(BeepPattern::Multi)
        );
        assert_eq!(policy(TimerKind::Stopwatch).completion_pattern(), None);
    }

    #[test]
    fn first_run_record_has_signals_on() {
        let record = policy(TimerKind::Countdown).default_record(FIRST_RUN_SIGNAL);
        assert_eq!(record.signal, SignalPrefs::ON);
        assert_eq!(record.version, 1);
        assert!(!record.is_running());
    }
}
