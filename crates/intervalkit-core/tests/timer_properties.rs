//! Property-based tests for the clock, codec and signal machine.
//!
//! Properties verified:
//! - Decoding an encoded valid record gives the same record back
//! - A running countdown never increases and is exactly 0 at its deadline
//! - A running stopwatch never decreases
//! - Pausing twice changes nothing the second time
//! - Warning and completion fire at most once per run under any tick timing

use intervalkit_core::storage::{Codec, DecodeOutcome};
use intervalkit_core::timer::{
    policy, Action, Clocked, CountdownBody, CycleBody, DualClockBody, MultiBody, SegmentId, Side,
    SignalPrefs, StopwatchBody, SubTimer, TimerBody, TimerKind, TimerRecord, TimerSession,
};
use intervalkit_core::Event;
use proptest::prelude::*;

fn signal() -> impl Strategy<Value = SignalPrefs> {
    (any::<bool>(), any::<bool>()).prop_map(|(sound, flash)| SignalPrefs { sound, flash })
}

/// A countdown body in any legal state for `kind`.
fn countdown_body(kind: TimerKind) -> impl Strategy<Value = CountdownBody> {
    let p = policy(kind);
    (p.min_duration_ms..=p.max_duration_ms)
        .prop_flat_map(|duration_ms| {
            (
                Just(duration_ms),
                0..=duration_ms,
                proptest::option::of(0..=duration_ms),
                proptest::option::of(0i64..4_000_000_000_000),
            )
        })
        .prop_map(|(duration_ms, remaining_ms, warn_at_ms, end_at)| CountdownBody {
            duration_ms,
            remaining_ms,
            running: end_at.is_some(),
            end_at,
            warn_at_ms,
        })
}

fn stopwatch_body() -> impl Strategy<Value = StopwatchBody> {
    let max = StopwatchBody::max_ms();
    (
        0..=max,
        proptest::option::of(0i64..4_000_000_000_000),
        proptest::collection::vec(0..=max, 0..20),
    )
        .prop_map(|(elapsed_ms, started_at, laps)| StopwatchBody {
            elapsed_ms,
            running: started_at.is_some(),
            started_at,
            laps,
        })
}

fn cycle_body() -> impl Strategy<Value = CycleBody> {
    (countdown_body(TimerKind::Cycle), 0u64..10_000).prop_map(|(c, cycles)| CycleBody {
        interval_ms: c.duration_ms,
        remaining_ms: c.remaining_ms,
        running: c.running,
        end_at: c.end_at,
        warn_at_ms: c.warn_at_ms,
        cycles,
    })
}

fn dual_clock_body() -> impl Strategy<Value = DualClockBody> {
    (
        countdown_body(TimerKind::DualClock),
        any::<bool>(),
        any::<prop::sample::Index>(),
    )
        .prop_map(|(c, right, other)| {
            let active_side = if right { Side::Right } else { Side::Left };
            let mut sides_ms = [0; 2];
            sides_ms[active_side.index()] = c.remaining_ms;
            sides_ms[active_side.other().index()] = other.index(c.duration_ms as usize + 1) as u64;
            DualClockBody {
                duration_ms: c.duration_ms,
                sides_ms,
                active_side,
                running: c.running,
                end_at: c.end_at,
                warn_at_ms: c.warn_at_ms,
            }
        })
}

fn multi_body() -> impl Strategy<Value = MultiBody> {
    proptest::collection::btree_map(
        "[a-z]{1,8}",
        ("[A-Za-z ]{0,12}", countdown_body(TimerKind::Multi)),
        0..=12,
    )
    .prop_map(|timers| MultiBody {
        timers: timers
            .into_iter()
            .map(|(id, (name, clock))| (id, SubTimer { name, clock }))
            .collect(),
    })
}

fn record() -> impl Strategy<Value = TimerRecord> {
    let body = prop_oneof![
        countdown_body(TimerKind::Countdown).prop_map(TimerBody::Countdown),
        countdown_body(TimerKind::Analog).prop_map(TimerBody::Analog),
        stopwatch_body().prop_map(TimerBody::Stopwatch),
        cycle_body().prop_map(TimerBody::Cycle),
        dual_clock_body().prop_map(TimerBody::DualClock),
        multi_body().prop_map(TimerBody::Multi),
    ];
    (body, signal()).prop_map(|(body, signal)| TimerRecord::new(body, signal))
}

proptest! {
    #[test]
    fn prop_decode_encode_round_trip(record in record()) {
        let codec = Codec::default();
        let raw = codec.encode(&record).unwrap();
        let decoded = codec.decode(Some(&raw), record.kind());
        prop_assert_eq!(decoded.outcome, DecodeOutcome::Clean);
        prop_assert_eq!(decoded.record, record);
    }

    #[test]
    fn prop_running_countdown_never_increases(
        duration_ms in 1_000u64..=3_600_000,
        start in 0i64..1_000_000,
        mut offsets in proptest::collection::vec(-10_000i64..5_000_000, 1..50),
    ) {
        let mut clock = CountdownBody::new(duration_ms);
        clock.start(start);
        offsets.sort_unstable();
        let mut previous = u64::MAX;
        for offset in offsets {
            let shown = clock.display_ms(start + offset);
            prop_assert!(shown <= previous);
            prop_assert!(shown <= duration_ms);
            previous = shown;
        }
        prop_assert_eq!(clock.display_ms(start + duration_ms as i64), 0);
    }

    #[test]
    fn prop_running_stopwatch_never_decreases(
        start in 0i64..1_000_000,
        elapsed in 0u64..1_000_000,
        mut offsets in proptest::collection::vec(0i64..10_000_000, 1..50),
    ) {
        let mut clock = StopwatchBody::new();
        clock.elapsed_ms = elapsed;
        clock.start(start);
        offsets.sort_unstable();
        let mut previous = elapsed;
        for offset in offsets {
            let shown = clock.display_ms(start + offset);
            prop_assert!(shown >= previous);
            previous = shown;
        }
    }

    #[test]
    fn prop_second_pause_is_a_no_op(
        duration_ms in 1_000u64..=3_600_000,
        first in 0i64..5_000_000,
        gap in 0i64..5_000_000,
    ) {
        let record = TimerRecord::new(
            TimerBody::Countdown(CountdownBody::new(duration_ms)),
            SignalPrefs::ON,
        );
        let mut session = TimerSession::new(record, 0);
        session.apply(Action::Start(SegmentId::Root), 0);
        session.apply(Action::Pause(SegmentId::Root), first);
        let after_first = session.record().clone();
        let events = session.apply(Action::Pause(SegmentId::Root), first + gap);
        prop_assert!(events.is_empty());
        prop_assert_eq!(session.record(), &after_first);
    }

    #[test]
    fn prop_signals_fire_once_per_crossing(
        mut ticks in proptest::collection::vec(1i64..400_000, 0..200),
    ) {
        let mut body = CountdownBody::new(300_000);
        body.warn_at_ms = Some(60_000);
        let record = TimerRecord::new(TimerBody::Countdown(body), SignalPrefs::ON);
        let mut session = TimerSession::new(record, 0);
        let mut events = session.apply(Action::Start(SegmentId::Root), 0);

        ticks.push(300_000);
        ticks.sort_unstable();
        for now in &ticks {
            events.extend(session.tick(*now));
        }

        let warned_in_window = ticks.iter().any(|t| (240_000..300_000).contains(t));
        let warnings = events
            .iter()
            .filter(|e| matches!(e, Event::WarningReached { .. }))
            .count();
        let completions = events
            .iter()
            .filter(|e| matches!(e, Event::TimerCompleted { .. }))
            .count();
        prop_assert_eq!(warnings, usize::from(warned_in_window));
        prop_assert_eq!(completions, 1);
        prop_assert!(!session.is_running());

        let seconds: Vec<u64> = events
            .iter()
            .filter_map(|e| match e {
                Event::LastSecondsTick { second, .. } => Some(*second),
                _ => None,
            })
            .collect();
        prop_assert!(seconds.windows(2).all(|w| w[0] > w[1]));
    }
}
