//! Signal/alarm state machine.
//!
//! Per run segment a countdown-like clock walks
//!
//! ```text
//! Idle --(remaining <= warn_at)--> Warned --(remaining == 0)--> Completed
//! ```
//!
//! and each transition reports its signal once. `Warned` falls back to `Idle`
//! only when the remaining time rises above the threshold again, so a clock
//! sitting below the threshold does not warn on every tick. The last-seconds
//! tick is tracked separately by the last whole second it fired for.

use serde::{Deserialize, Serialize};

use super::policy::CompletionPolicy;
use super::record::{SegmentId, Side, TimerBody};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalPhase {
    #[default]
    Idle,
    Warned,
    Completed,
}

/// What one observation of a clock crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Crossings {
    pub warning: bool,
    /// Whole second (rounded up) that just started ticking.
    pub tick: Option<u64>,
    pub completed: bool,
}

impl Crossings {
    pub fn is_empty(&self) -> bool {
        !self.warning && self.tick.is_none() && !self.completed
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalTracker {
    phase: SignalPhase,
    last_tick_second: Option<u64>,
}

impl SignalTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SignalPhase {
        self.phase
    }

    /// Forget everything fired so far: a new run segment begins.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Adopt a clock already in flight without firing for thresholds it
    /// crossed before we were watching. Zero is left unobserved so the
    /// completion check still runs.
    pub fn prime(&mut self, remaining_ms: u64, warn_at_ms: Option<u64>, tick_window_ms: Option<u64>) {
        self.reset();
        if remaining_ms == 0 {
            return;
        }
        if warn_at_ms.is_some_and(|warn| remaining_ms <= warn) {
            self.phase = SignalPhase::Warned;
        }
        if tick_window_ms.is_some_and(|window| remaining_ms <= window) {
            self.last_tick_second = Some(remaining_ms.div_ceil(1_000));
        }
    }

    /// Observe a running clock's remaining time.
    pub fn observe(
        &mut self,
        remaining_ms: u64,
        warn_at_ms: Option<u64>,
        tick_window_ms: Option<u64>,
    ) -> Crossings {
        let mut crossings = Crossings::default();

        if remaining_ms == 0 {
            if self.phase != SignalPhase::Completed {
                self.phase = SignalPhase::Completed;
                crossings.completed = true;
            }
            return crossings;
        }

        match (self.phase, warn_at_ms) {
            (SignalPhase::Idle, Some(warn)) if remaining_ms <= warn => {
                self.phase = SignalPhase::Warned;
                crossings.warning = true;
            }
            (SignalPhase::Warned, Some(warn)) if remaining_ms > warn => {
                self.phase = SignalPhase::Idle;
            }
            (SignalPhase::Warned, None) | (SignalPhase::Completed, _) => {
                self.phase = SignalPhase::Idle;
            }
            _ => {}
        }

        match tick_window_ms {
            Some(window) if remaining_ms <= window => {
                let second = remaining_ms.div_ceil(1_000);
                if self.last_tick_second != Some(second) {
                    self.last_tick_second = Some(second);
                    crossings.tick = Some(second);
                }
            }
            _ => self.last_tick_second = None,
        }

        crossings
    }
}

/// How a completion changed the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Stopped,
    Rearmed { cycles: u64, end_at: i64 },
    StoppedAll { flagged: Side },
}

/// Apply the kind's completion policy to a segment that reached zero.
///
/// Returns `None` if the segment is missing or its kind never completes.
pub fn apply_completion(
    body: &mut TimerBody,
    segment: &SegmentId,
    policy: CompletionPolicy,
    now: i64,
) -> Option<CompletionOutcome> {
    match (policy, body, segment) {
        (CompletionPolicy::Rearm, TimerBody::Cycle(cycle), SegmentId::Root) => {
            let end_at = cycle.rearm(now);
            Some(CompletionOutcome::Rearmed {
                cycles: cycle.cycles,
                end_at,
            })
        }
        (CompletionPolicy::StopAll, TimerBody::DualClock(dual), SegmentId::Root) => {
            let flagged = dual.active_side;
            dual.sides_ms[flagged.index()] = 0;
            dual.running = false;
            dual.end_at = None;
            Some(CompletionOutcome::StoppedAll { flagged })
        }
        (CompletionPolicy::Never, _, _) => None,
        (_, body, segment) => {
            let clock = body.clock_mut(segment)?;
            clock.pause(now);
            clock.adjust(i64::MIN, now);
            Some(CompletionOutcome::Stopped)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::clock::Clocked;
    use crate::timer::record::{CountdownBody, CycleBody, DualClockBody};

    #[test]
    fn warning_fires_once_below_threshold() {
        let mut tracker = SignalTracker::new();
        assert!(!tracker.observe(20_000, Some(10_000), None).warning);
        assert!(tracker.observe(9_999, Some(10_000), None).warning);
        for remaining in (1..9_000).rev().step_by(7) {
            assert!(!tracker.observe(remaining, Some(10_000), None).warning);
        }
        assert_eq!(tracker.phase(), SignalPhase::Warned);
    }

    #[test]
    fn leaving_warned_rearms_warning() {
        let mut tracker = SignalTracker::new();
        assert!(tracker.observe(5_000, Some(10_000), None).warning);
        assert!(!tracker.observe(15_000, Some(10_000), None).warning);
        assert_eq!(tracker.phase(), SignalPhase::Idle);
        assert!(tracker.observe(9_000, Some(10_000), None).warning);
    }

    #[test]
    fn completion_fires_once() {
        let mut tracker = SignalTracker::new();
        assert!(tracker.observe(0, None, None).completed);
        assert!(!tracker.observe(0, None, None).completed);
        tracker.reset();
        assert!(tracker.observe(0, None, None).completed);
    }

    #[test]
    fn ticks_once_per_whole_second() {
        let mut tracker = SignalTracker::new();
        let window = Some(10_000);
        assert_eq!(tracker.observe(10_500, None, window).tick, None);
        assert_eq!(tracker.observe(10_000, None, window).tick, Some(10));
        assert_eq!(tracker.observe(9_400, None, window).tick, None);
        assert_eq!(tracker.observe(9_001, None, window).tick, None);
        assert_eq!(tracker.observe(9_000, None, window).tick, Some(9));
        assert_eq!(tracker.observe(1, None, window).tick, Some(1));
    }

    #[test]
    fn tick_and_warning_are_independent() {
        let mut tracker = SignalTracker::new();
        let crossings = tracker.observe(5_000, Some(5_000), Some(10_000));
        assert!(crossings.warning);
        assert_eq!(crossings.tick, Some(5));
    }

    #[test]
    fn prime_suppresses_already_crossed_thresholds() {
        let mut tracker = SignalTracker::new();
        tracker.prime(4_200, Some(10_000), Some(10_000));
        let crossings = tracker.observe(4_100, Some(10_000), Some(10_000));
        assert!(crossings.is_empty());
        assert_eq!(tracker.observe(4_000, Some(10_000), Some(10_000)).tick, Some(4));
    }

    #[test]
    fn prime_keeps_completion_observable() {
        let mut tracker = SignalTracker::new();
        tracker.prime(0, Some(10_000), Some(10_000));
        assert!(tracker.observe(0, Some(10_000), Some(10_000)).completed);
    }

    #[test]
    fn countdown_completion_stops_at_zero() {
        let mut clock = CountdownBody::new(300_000);
        clock.start(0);
        let mut body = TimerBody::Countdown(clock);
        let outcome =
            apply_completion(&mut body, &SegmentId::Root, CompletionPolicy::Stop, 300_020);
        assert_eq!(outcome, Some(CompletionOutcome::Stopped));
        let TimerBody::Countdown(clock) = body else {
            panic!("kind changed");
        };
        assert!(!clock.running);
        assert_eq!(clock.remaining_ms, 0);
        assert_eq!(clock.end_at, None);
    }

    #[test]
    fn cycle_completion_rearms_from_now() {
        let mut cycle = CycleBody::new(60_000);
        cycle.start(0);
        let mut body = TimerBody::Cycle(cycle);
        let outcome =
            apply_completion(&mut body, &SegmentId::Root, CompletionPolicy::Rearm, 60_000);
        assert_eq!(
            outcome,
            Some(CompletionOutcome::Rearmed {
                cycles: 1,
                end_at: 120_000
            })
        );
        assert!(body.is_running());
    }

    #[test]
    fn dual_clock_completion_stops_both_sides() {
        let mut dual = DualClockBody::new(10_000);
        dual.start(0);
        dual.switch_side(4_000);
        let mut body = TimerBody::DualClock(dual);
        let outcome =
            apply_completion(&mut body, &SegmentId::Root, CompletionPolicy::StopAll, 14_000);
        assert_eq!(
            outcome,
            Some(CompletionOutcome::StoppedAll {
                flagged: Side::Right
            })
        );
        let TimerBody::DualClock(dual) = body else {
            panic!("kind changed");
        };
        assert!(!dual.running);
        assert_eq!(dual.sides_ms, [6_000, 0]);
    }
}
