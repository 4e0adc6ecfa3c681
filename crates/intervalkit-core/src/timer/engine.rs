//! Timer engine implementation.
//!
//! The timer engine is a wall-clock-based state machine over one
//! [`TimerRecord`]. It does not use internal threads or read the clock: every
//! call takes `now` (epoch ms) and the caller is responsible for calling
//! `tick()` periodically.
//!
//! ## Usage
//!
//! ```ignore
//! let mut session = TimerSession::new(record, now);
//! session.tick(now);                       // reload contract: settle expired timers
//! session.apply(Action::Start(SegmentId::Root), now);
//! // In a loop:
//! session.tick(now);                       // returns signals and completions
//! ```

use std::collections::BTreeMap;

use super::clock::Display;
use super::policy::KindPolicy;
use super::record::{
    CountdownBody, SegmentId, SignalPrefs, SubTimer, TimerBody, TimerKind, TimerMode, TimerRecord,
};
use super::signal::{apply_completion, CompletionOutcome, SignalTracker};
use crate::events::{at, Event};

/// A user action against a session.
///
/// `SegmentId::Root` on a `multi` record addresses every sub-timer at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Start(SegmentId),
    Pause(SegmentId),
    Toggle(SegmentId),
    Reset(SegmentId),
    Adjust { segment: SegmentId, delta_ms: i64 },
    SetDuration { segment: SegmentId, duration_ms: u64 },
    SetWarnAt { segment: SegmentId, warn_at_ms: Option<u64> },
    SetSignal(SignalPrefs),
    Lap,
    SwitchSide,
    AddSubTimer { id: String, name: String, duration_ms: u64 },
    RemoveSubTimer { id: String },
}

/// Core timer engine for one record.
#[derive(Debug, Clone)]
pub struct TimerSession {
    record: TimerRecord,
    trackers: BTreeMap<SegmentId, SignalTracker>,
    tick_window_override: Option<u64>,
}

impl TimerSession {
    /// Adopt a record, priming signal trackers for clocks already running.
    pub fn new(record: TimerRecord, now: i64) -> Self {
        let mut session = Self {
            record,
            trackers: BTreeMap::new(),
            tick_window_override: None,
        };
        session.prime_trackers(now);
        session
    }

    /// Override the last-seconds window for kinds that tick at all.
    pub fn with_tick_window(mut self, window_ms: u64, now: i64) -> Self {
        self.tick_window_override = Some(window_ms);
        self.prime_trackers(now);
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn record(&self) -> &TimerRecord {
        &self.record
    }

    pub fn kind(&self) -> TimerKind {
        self.record.kind()
    }

    pub fn policy(&self) -> &'static KindPolicy {
        self.record.policy()
    }

    pub fn is_running(&self) -> bool {
        self.record.is_running()
    }

    pub fn display(&self, segment: &SegmentId, now: i64) -> Option<Display> {
        self.record.body.display(segment, now)
    }

    fn tick_window(&self) -> Option<u64> {
        self.policy()
            .last_seconds_window_ms
            .map(|w| self.tick_window_override.unwrap_or(w))
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Apply a user action. Returns the resulting events; an empty list
    /// means nothing changed. Any threshold the action crossed is reported
    /// in the same call.
    pub fn apply(&mut self, action: Action, now: i64) -> Vec<Event> {
        let kind = self.record.kind();
        let mut events = Vec::new();
        match action {
            Action::Start(segment) => {
                for seg in self.targets(&segment) {
                    self.start_segment(&seg, now, &mut events);
                }
            }
            Action::Pause(segment) => {
                for seg in self.targets(&segment) {
                    self.pause_segment(&seg, now, &mut events);
                }
            }
            Action::Toggle(segment) => {
                let running = self
                    .display(&segment, now)
                    .is_some_and(|display| display.running);
                for seg in self.targets(&segment) {
                    if running {
                        self.pause_segment(&seg, now, &mut events);
                    } else {
                        self.start_segment(&seg, now, &mut events);
                    }
                }
            }
            Action::Reset(segment) => {
                for seg in self.targets(&segment) {
                    self.reset_segment(&seg, now, &mut events);
                }
            }
            Action::Adjust { segment, delta_ms } => {
                if let Some(clock) = self.record.body.clock_mut(&segment) {
                    if clock.adjust(delta_ms, now) {
                        events.push(Event::TimerAdjusted {
                            kind,
                            segment: label(&segment),
                            value_ms: clock.display_ms(now),
                            at: at(now),
                        });
                    }
                }
            }
            Action::SetDuration {
                segment,
                duration_ms,
            } => {
                let duration_ms = self.policy().clamp_duration(duration_ms);
                if let Some(clock) = self.record.body.clock_mut(&segment) {
                    if clock.set_duration(duration_ms, now) {
                        self.trackers.entry(segment.clone()).or_default().reset();
                        events.push(Event::DurationChanged {
                            kind,
                            segment: label(&segment),
                            duration_ms,
                            at: at(now),
                        });
                    }
                }
            }
            Action::SetWarnAt {
                segment,
                warn_at_ms,
            } => {
                if let Some(clock) = self.record.body.clock_mut(&segment) {
                    if clock.set_warn_at(warn_at_ms) {
                        events.push(Event::WarnAtChanged {
                            kind,
                            segment: label(&segment),
                            warn_at_ms: clock.warn_at_ms(),
                            at: at(now),
                        });
                    }
                }
            }
            Action::SetSignal(signal) => {
                if self.record.signal != signal {
                    self.record.signal = signal;
                    events.push(Event::SignalPrefsChanged {
                        signal,
                        at: at(now),
                    });
                }
            }
            Action::Lap => {
                let max_laps = self.policy().max_laps;
                if let TimerBody::Stopwatch(stopwatch) = &mut self.record.body {
                    if let Some(split_ms) = stopwatch.lap(now, max_laps) {
                        events.push(Event::LapRecorded {
                            lap_index: stopwatch.laps.len(),
                            split_ms,
                            at: at(now),
                        });
                    }
                }
            }
            Action::SwitchSide => {
                if let TimerBody::DualClock(dual) = &mut self.record.body {
                    if dual.flagged_side(now).is_none() {
                        let active = dual.switch_side(now);
                        self.trackers.entry(SegmentId::Root).or_default().reset();
                        events.push(Event::SideSwitched {
                            active,
                            at: at(now),
                        });
                    }
                }
            }
            Action::AddSubTimer {
                id,
                name,
                duration_ms,
            } => {
                let policy = self.policy();
                let duration_ms = policy.clamp_duration(duration_ms);
                if let TimerBody::Multi(multi) = &mut self.record.body {
                    let has_room = multi.timers.len() < policy.max_sub_timers;
                    if has_room && !id.is_empty() && !multi.timers.contains_key(&id) {
                        multi.timers.insert(
                            id.clone(),
                            SubTimer {
                                name: name.clone(),
                                clock: CountdownBody::new(duration_ms),
                            },
                        );
                        events.push(Event::SubTimerAdded {
                            id,
                            name,
                            duration_ms,
                            at: at(now),
                        });
                    }
                }
            }
            Action::RemoveSubTimer { id } => {
                if let TimerBody::Multi(multi) = &mut self.record.body {
                    if multi.timers.remove(&id).is_some() {
                        self.trackers.remove(&SegmentId::Sub(id.clone()));
                        events.push(Event::SubTimerRemoved { id, at: at(now) });
                    }
                }
            }
        }

        if !events.is_empty() && self.is_running() {
            events.extend(self.tick(now));
        }
        events
    }

    /// Observe every running clock at `now`. Returns warnings, last-seconds
    /// ticks and completions; a clock observed at zero is completed here,
    /// within this call.
    pub fn tick(&mut self, now: i64) -> Vec<Event> {
        let mut events = Vec::new();
        if self.record.mode() == TimerMode::CountUp {
            return events;
        }
        let window = self.tick_window();
        let kind = self.record.kind();

        for segment in self.record.body.segment_ids() {
            let Some(clock) = self.record.body.clock(&segment) else {
                continue;
            };
            if !clock.is_running() {
                continue;
            }
            let remaining_ms = clock.display_ms(now);
            let warn_at_ms = clock.warn_at_ms();
            let crossings = self
                .trackers
                .entry(segment.clone())
                .or_default()
                .observe(remaining_ms, warn_at_ms, window);

            if crossings.warning {
                events.push(Event::WarningReached {
                    kind,
                    segment: label(&segment),
                    remaining_ms,
                    at: at(now),
                });
            }
            if let Some(second) = crossings.tick {
                events.push(Event::LastSecondsTick {
                    kind,
                    segment: label(&segment),
                    second,
                    at: at(now),
                });
            }
            if crossings.completed {
                self.complete(&segment, now, &mut events);
            }
        }
        events
    }

    /// Replace the whole record with one written by another tab.
    pub fn replace(&mut self, record: TimerRecord, now: i64) -> Event {
        self.record = record;
        self.trackers.clear();
        self.prime_trackers(now);
        Event::RecordReplaced {
            kind: self.record.kind(),
            running: self.record.is_running(),
            at: at(now),
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn targets(&self, segment: &SegmentId) -> Vec<SegmentId> {
        match (&self.record.body, segment) {
            (TimerBody::Multi(_), SegmentId::Root) => self.record.body.segment_ids(),
            _ => vec![segment.clone()],
        }
    }

    fn start_segment(&mut self, segment: &SegmentId, now: i64, events: &mut Vec<Event>) {
        let kind = self.record.kind();
        let Some(clock) = self.record.body.clock_mut(segment) else {
            return;
        };
        if clock.start(now) {
            self.trackers.entry(segment.clone()).or_default().reset();
            events.push(Event::TimerStarted {
                kind,
                segment: label(segment),
                value_ms: clock.display_ms(now),
                at: at(now),
            });
        }
    }

    fn pause_segment(&mut self, segment: &SegmentId, now: i64, events: &mut Vec<Event>) {
        let kind = self.record.kind();
        let Some(clock) = self.record.body.clock_mut(segment) else {
            return;
        };
        if clock.pause(now) {
            self.trackers.entry(segment.clone()).or_default().reset();
            events.push(Event::TimerPaused {
                kind,
                segment: label(segment),
                value_ms: clock.display_ms(now),
                at: at(now),
            });
        }
    }

    fn reset_segment(&mut self, segment: &SegmentId, now: i64, events: &mut Vec<Event>) {
        let kind = self.record.kind();
        let Some(clock) = self.record.body.clock_mut(segment) else {
            return;
        };
        if clock.reset() {
            self.trackers.entry(segment.clone()).or_default().reset();
            events.push(Event::TimerReset {
                kind,
                segment: label(segment),
                at: at(now),
            });
        }
    }

    fn complete(&mut self, segment: &SegmentId, now: i64, events: &mut Vec<Event>) {
        let policy = self.policy();
        let duration_ms = nominal_duration(&self.record.body, segment);
        let Some(outcome) = apply_completion(&mut self.record.body, segment, policy.completion, now)
        else {
            return;
        };
        if let Some(pattern) = policy.completion_pattern() {
            events.push(Event::TimerCompleted {
                kind: policy.kind,
                segment: label(segment),
                pattern,
                duration_ms,
                at: at(now),
            });
        }
        if let CompletionOutcome::Rearmed { cycles, end_at } = outcome {
            events.push(Event::CycleRearmed {
                kind: policy.kind,
                cycles,
                end_at,
                at: at(now),
            });
        }
        self.trackers.entry(segment.clone()).or_default().reset();
    }

    fn prime_trackers(&mut self, now: i64) {
        let window = self.tick_window();
        for segment in self.record.body.segment_ids() {
            let tracker = self.trackers.entry(segment.clone()).or_default();
            match self.record.body.clock(&segment) {
                Some(clock) if clock.is_running() => {
                    tracker.prime(clock.display_ms(now), clock.warn_at_ms(), window)
                }
                _ => tracker.reset(),
            }
        }
    }
}

fn label(segment: &SegmentId) -> Option<String> {
    segment.sub_id().map(str::to_string)
}

/// The full length of one run of `segment`; zero for clocks that count up.
pub(crate) fn nominal_duration(body: &TimerBody, segment: &SegmentId) -> u64 {
    match (body, segment) {
        (TimerBody::Countdown(b) | TimerBody::Analog(b), _) => b.duration_ms,
        (TimerBody::Cycle(b), _) => b.interval_ms,
        (TimerBody::DualClock(b), _) => b.duration_ms,
        (TimerBody::Multi(m), SegmentId::Sub(id)) => {
            m.timers.get(id).map(|t| t.clock.duration_ms).unwrap_or(0)
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::policy::{policy, BeepPattern, FIRST_RUN_SIGNAL};
    use crate::timer::record::{CycleBody, Side};

    fn countdown(duration_ms: u64) -> TimerSession {
        let record = TimerRecord::new(
            TimerBody::Countdown(CountdownBody::new(duration_ms)),
            FIRST_RUN_SIGNAL,
        );
        TimerSession::new(record, 0)
    }

    fn completions(events: &[Event]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, Event::TimerCompleted { .. }))
            .count()
    }

    #[test]
    fn countdown_runs_to_completion_once() {
        let mut session = countdown(300_000);
        session.apply(Action::Start(SegmentId::Root), 0);

        let events = session.tick(299_000);
        assert!(matches!(
            events.as_slice(),
            [Event::LastSecondsTick { second: 1, .. }]
        ));
        assert!(session.is_running());
        assert_eq!(
            session.display(&SegmentId::Root, 299_000).unwrap().value_ms,
            1_000
        );

        let events = session.tick(300_000);
        assert_eq!(completions(&events), 1);
        assert!(!session.is_running());
        assert_eq!(session.display(&SegmentId::Root, 300_000).unwrap().value_ms, 0);

        assert_eq!(completions(&session.tick(300_016)), 0);
        assert_eq!(completions(&session.tick(400_000)), 0);
    }

    #[test]
    fn completion_uses_multi_beep_for_countdown() {
        let mut session = countdown(1_000);
        session.apply(Action::Start(SegmentId::Root), 0);
        let events = session.tick(5_000);
        assert!(events.iter().any(|e| matches!(
            e,
            Event::TimerCompleted {
                pattern: BeepPattern::Multi,
                duration_ms: 1_000,
                ..
            }
        )));
    }

    #[test]
    fn cycle_rearms_and_counts() {
        let record = TimerRecord::new(TimerBody::Cycle(CycleBody::new(60_000)), FIRST_RUN_SIGNAL);
        let mut session = TimerSession::new(record, 0);
        session.apply(Action::Start(SegmentId::Root), 0);

        let events = session.tick(60_000);
        assert!(events.iter().any(|e| matches!(
            e,
            Event::TimerCompleted {
                pattern: BeepPattern::Single,
                ..
            }
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            Event::CycleRearmed {
                cycles: 1,
                end_at: 120_000,
                ..
            }
        )));
        assert!(session.is_running());
        let TimerBody::Cycle(cycle) = &session.record().body else {
            panic!("kind changed");
        };
        assert_eq!(cycle.end_at, Some(120_000));
        assert_eq!(cycle.cycles, 1);
    }

    #[test]
    fn warning_fires_again_in_next_cycle() {
        let record = TimerRecord::new(TimerBody::Cycle(CycleBody::new(60_000)), FIRST_RUN_SIGNAL);
        let mut session = TimerSession::new(record, 0);
        session.apply(
            Action::SetWarnAt {
                segment: SegmentId::Root,
                warn_at_ms: Some(15_000),
            },
            0,
        );
        session.apply(Action::Start(SegmentId::Root), 0);
        let warnings = |events: &[Event]| {
            events
                .iter()
                .filter(|e| matches!(e, Event::WarningReached { .. }))
                .count()
        };
        assert_eq!(warnings(&session.tick(45_000)), 1);
        assert_eq!(warnings(&session.tick(46_000)), 0);
        session.tick(60_000);
        assert_eq!(warnings(&session.tick(105_000)), 1);
    }

    #[test]
    fn pausing_resets_fired_flags() {
        let mut session = countdown(60_000);
        session.apply(
            Action::SetWarnAt {
                segment: SegmentId::Root,
                warn_at_ms: Some(30_000),
            },
            0,
        );
        session.apply(Action::Start(SegmentId::Root), 0);
        assert_eq!(session.tick(29_000).len(), 0);
        assert!(session.tick(30_000).iter().any(|e| matches!(e, Event::WarningReached { .. })));

        session.apply(Action::Pause(SegmentId::Root), 35_000);
        let events = session.apply(Action::Start(SegmentId::Root), 40_000);
        assert!(events.iter().any(|e| matches!(e, Event::WarningReached { .. })));
    }

    #[test]
    fn pause_twice_is_idempotent() {
        let mut session = countdown(60_000);
        session.apply(Action::Start(SegmentId::Root), 0);
        assert_eq!(session.apply(Action::Pause(SegmentId::Root), 10_000).len(), 1);
        let after_first = session.record().clone();
        assert!(session.apply(Action::Pause(SegmentId::Root), 20_000).is_empty());
        assert_eq!(session.record(), &after_first);
    }

    #[test]
    fn adjusting_to_zero_completes_immediately() {
        let mut session = countdown(60_000);
        session.apply(Action::Start(SegmentId::Root), 0);
        let events = session.apply(
            Action::Adjust {
                segment: SegmentId::Root,
                delta_ms: -120_000,
            },
            1_000,
        );
        assert_eq!(completions(&events), 1);
        assert!(!session.is_running());
    }

    #[test]
    fn set_duration_is_clamped() {
        let mut session = countdown(60_000);
        let events = session.apply(
            Action::SetDuration {
                segment: SegmentId::Root,
                duration_ms: 10,
            },
            0,
        );
        assert!(matches!(
            events.as_slice(),
            [Event::DurationChanged {
                duration_ms: 1_000,
                ..
            }]
        ));
    }

    #[test]
    fn expired_on_load_completes_on_first_tick() {
        let mut body = CountdownBody::new(60_000);
        body.running = true;
        body.end_at = Some(95_000);
        body.remaining_ms = 0;
        let record = TimerRecord::new(TimerBody::Countdown(body), FIRST_RUN_SIGNAL);
        let mut session = TimerSession::new(record, 100_000);
        assert_eq!(completions(&session.tick(100_000)), 1);
        assert!(!session.is_running());
    }

    #[test]
    fn dual_clock_flag_stops_whole_record() {
        let record = policy(TimerKind::DualClock).default_record(FIRST_RUN_SIGNAL);
        let mut session = TimerSession::new(record, 0);
        session.apply(
            Action::SetDuration {
                segment: SegmentId::Root,
                duration_ms: 10_000,
            },
            0,
        );
        session.apply(Action::Start(SegmentId::Root), 0);
        session.apply(Action::SwitchSide, 3_000);
        let events = session.tick(13_000);
        assert_eq!(completions(&events), 1);
        let TimerBody::DualClock(dual) = &session.record().body else {
            panic!("kind changed");
        };
        assert!(!dual.running);
        assert_eq!(dual.side_ms(Side::Left), 7_000);
        assert_eq!(dual.side_ms(Side::Right), 0);
        assert!(session.apply(Action::SwitchSide, 14_000).is_empty());
    }

    #[test]
    fn stopwatch_records_laps_and_never_completes() {
        let record = policy(TimerKind::Stopwatch).default_record(FIRST_RUN_SIGNAL);
        let mut session = TimerSession::new(record, 0);
        session.apply(Action::Start(SegmentId::Root), 0);
        let events = session.apply(Action::Lap, 1_230);
        assert!(matches!(
            events.as_slice(),
            [Event::LapRecorded {
                lap_index: 1,
                split_ms: 1_230,
                ..
            }]
        ));
        assert!(session.tick(i64::from(u32::MAX)).is_empty());
    }

    #[test]
    fn multi_sub_timers_complete_independently() {
        let record = policy(TimerKind::Multi).default_record(FIRST_RUN_SIGNAL);
        let mut session = TimerSession::new(record, 0);
        for (id, ms) in [("tea", 180_000), ("eggs", 420_000)] {
            session.apply(
                Action::AddSubTimer {
                    id: id.into(),
                    name: id.to_uppercase(),
                    duration_ms: ms,
                },
                0,
            );
        }
        session.apply(Action::Start(SegmentId::Root), 0);
        let events = session.tick(180_000);
        assert_eq!(completions(&events), 1);
        assert!(matches!(
            &events[0],
            Event::TimerCompleted { segment: Some(id), .. } if id == "tea"
        ));
        assert!(session.is_running());
        assert_eq!(
            session
                .display(&SegmentId::Sub("eggs".into()), 180_000)
                .unwrap()
                .value_ms,
            240_000
        );
    }

    #[test]
    fn multi_refuses_duplicate_and_excess_sub_timers() {
        let record = policy(TimerKind::Multi).default_record(FIRST_RUN_SIGNAL);
        let mut session = TimerSession::new(record, 0);
        let add = |id: String| Action::AddSubTimer {
            id,
            name: "t".into(),
            duration_ms: 60_000,
        };
        for i in 0..20 {
            session.apply(add(format!("t{i}")), 0);
        }
        assert!(session.apply(add("t0".into()), 0).is_empty());
        let TimerBody::Multi(multi) = &session.record().body else {
            panic!("kind changed");
        };
        assert_eq!(multi.timers.len(), 12);
    }

    #[test]
    fn replace_primes_trackers_without_refiring() {
        let mut session = countdown(60_000);
        let mut body = CountdownBody::new(60_000);
        body.running = true;
        body.end_at = Some(60_000);
        body.warn_at_ms = Some(30_000);
        let remote = TimerRecord::new(TimerBody::Countdown(body), FIRST_RUN_SIGNAL);

        let event = session.replace(remote, 40_000);
        assert!(matches!(event, Event::RecordReplaced { running: true, .. }));
        assert!(session
            .tick(40_500)
            .iter()
            .all(|e| !matches!(e, Event::WarningReached { .. })));
    }
}
