//! Drift-corrected clock.
//!
//! Displayed time is always derived from the stored anchor and the caller's
//! `now`, never from a counter decremented per tick:
//!
//! ```text
//! countdown-like, running:  clamp(end_at - now, 0, cap)
//! count-up, running:        clamp(now - started_at, 0, cap)
//! paused:                   the snapshot, verbatim
//! ```
//!
//! A count-up anchor is an origin, not a resume instant: starting sets
//! `started_at = now - elapsed`, so the running display never adds the
//! stored `elapsed` again.
//!
//! Pausing folds the derived value back into the snapshot and clears the
//! anchor, so exactly one of the two is authoritative at any instant.

use serde::{Deserialize, Serialize};

use super::policy::Granularity;
use super::record::{
    CountdownBody, CycleBody, DualClockBody, SegmentId, Side, StopwatchBody, TimerBody,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Down,
    Up,
}

/// What a UI shows for one clock at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Display {
    pub value_ms: u64,
    pub direction: Direction,
    pub running: bool,
}

impl Display {
    pub fn expired(&self) -> bool {
        self.direction == Direction::Down && self.value_ms == 0
    }
}

/// Wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Remaining time before `end_at`, clamped into `0..=cap_ms`.
pub fn remaining_at(end_at: i64, cap_ms: u64, now: i64) -> u64 {
    let left = end_at.saturating_sub(now);
    if left <= 0 {
        0
    } else {
        (left as u64).min(cap_ms)
    }
}

/// Elapsed time since the origin `started_at`, clamped into `0..=max_ms`.
pub fn elapsed_at(started_at: i64, max_ms: u64, now: i64) -> u64 {
    let elapsed = now.saturating_sub(started_at);
    if elapsed <= 0 {
        0
    } else {
        (elapsed as u64).min(max_ms)
    }
}

/// Deadline `ms` after `now`.
fn deadline(now: i64, ms: u64) -> i64 {
    now.saturating_add(i64::try_from(ms).unwrap_or(i64::MAX))
}

/// Origin `ms` before `now`.
fn origin(now: i64, ms: u64) -> i64 {
    now.saturating_sub(i64::try_from(ms).unwrap_or(i64::MAX))
}

fn shift(value: u64, delta_ms: i64, max: u64) -> u64 {
    let shifted = if delta_ms >= 0 {
        value.saturating_add(delta_ms.unsigned_abs())
    } else {
        value.saturating_sub(delta_ms.unsigned_abs())
    };
    shifted.min(max)
}

/// One clock that can be started, paused and read.
///
/// Mutators return `false` when they changed nothing, which keeps them
/// idempotent: a second `pause` leaves the record untouched.
pub trait Clocked {
    fn direction(&self) -> Direction;

    fn is_running(&self) -> bool;

    fn display_ms(&self, now: i64) -> u64;

    fn start(&mut self, now: i64) -> bool;

    fn pause(&mut self, now: i64) -> bool;

    fn reset(&mut self) -> bool;

    /// Move the displayed value by `delta_ms`, clamped into the legal range.
    fn adjust(&mut self, _delta_ms: i64, _now: i64) -> bool {
        false
    }

    /// Replace the nominal length. `duration_ms` must already be clamped.
    fn set_duration(&mut self, _duration_ms: u64, _now: i64) -> bool {
        false
    }

    fn warn_at_ms(&self) -> Option<u64> {
        None
    }

    fn set_warn_at(&mut self, _warn_at_ms: Option<u64>) -> bool {
        false
    }

    fn display(&self, now: i64) -> Display {
        Display {
            value_ms: self.display_ms(now),
            direction: self.direction(),
            running: self.is_running(),
        }
    }
}

/// Shared countdown arithmetic over a (remaining, end_at, running) triple.
struct Countdown<'a> {
    cap_ms: u64,
    remaining_ms: &'a mut u64,
    end_at: &'a mut Option<i64>,
    running: &'a mut bool,
}

impl Countdown<'_> {
    fn current(&self, now: i64) -> u64 {
        read_countdown(*self.running, *self.end_at, *self.remaining_ms, self.cap_ms, now)
    }

    fn start(&mut self, now: i64) -> bool {
        if *self.running {
            return false;
        }
        if *self.remaining_ms == 0 {
            *self.remaining_ms = self.cap_ms;
        }
        *self.end_at = Some(deadline(now, *self.remaining_ms));
        *self.running = true;
        true
    }

    fn pause(&mut self, now: i64) -> bool {
        if !*self.running {
            return false;
        }
        *self.remaining_ms = self.current(now);
        *self.end_at = None;
        *self.running = false;
        true
    }

    fn set_remaining(&mut self, remaining_ms: u64, now: i64) {
        let remaining_ms = remaining_ms.min(self.cap_ms);
        if *self.running {
            *self.end_at = Some(deadline(now, remaining_ms));
        } else {
            *self.remaining_ms = remaining_ms;
        }
    }
}

fn read_countdown(running: bool, end_at: Option<i64>, remaining_ms: u64, cap_ms: u64, now: i64) -> u64 {
    match (running, end_at) {
        (true, Some(end)) => remaining_at(end, cap_ms, now),
        _ => remaining_ms.min(cap_ms),
    }
}

fn clamp_warn(warn_at_ms: Option<u64>, cap_ms: u64) -> Option<u64> {
    warn_at_ms.map(|w| w.min(cap_ms))
}

impl CountdownBody {
    fn countdown(&mut self) -> Countdown<'_> {
        Countdown {
            cap_ms: self.duration_ms,
            remaining_ms: &mut self.remaining_ms,
            end_at: &mut self.end_at,
            running: &mut self.running,
        }
    }
}

impl Clocked for CountdownBody {
    fn direction(&self) -> Direction {
        Direction::Down
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn display_ms(&self, now: i64) -> u64 {
        read_countdown(self.running, self.end_at, self.remaining_ms, self.duration_ms, now)
    }

    fn start(&mut self, now: i64) -> bool {
        self.countdown().start(now)
    }

    fn pause(&mut self, now: i64) -> bool {
        self.countdown().pause(now)
    }

    fn reset(&mut self) -> bool {
        let fresh = CountdownBody {
            warn_at_ms: self.warn_at_ms,
            ..CountdownBody::new(self.duration_ms)
        };
        let changed = *self != fresh;
        *self = fresh;
        changed
    }

    fn adjust(&mut self, delta_ms: i64, now: i64) -> bool {
        let current = self.display_ms(now);
        let target = shift(current, delta_ms, self.duration_ms);
        self.countdown().set_remaining(target, now);
        target != current
    }

    fn set_duration(&mut self, duration_ms: u64, now: i64) -> bool {
        if duration_ms == self.duration_ms {
            return false;
        }
        let current = self.display_ms(now);
        self.duration_ms = duration_ms;
        self.warn_at_ms = clamp_warn(self.warn_at_ms, duration_ms);
        let target = if self.running { current } else { duration_ms };
        self.countdown().set_remaining(target, now);
        true
    }

    fn warn_at_ms(&self) -> Option<u64> {
        self.warn_at_ms
    }

    fn set_warn_at(&mut self, warn_at_ms: Option<u64>) -> bool {
        let warn_at_ms = clamp_warn(warn_at_ms, self.duration_ms);
        let changed = self.warn_at_ms != warn_at_ms;
        self.warn_at_ms = warn_at_ms;
        changed
    }
}

impl CycleBody {
    fn countdown(&mut self) -> Countdown<'_> {
        Countdown {
            cap_ms: self.interval_ms,
            remaining_ms: &mut self.remaining_ms,
            end_at: &mut self.end_at,
            running: &mut self.running,
        }
    }

    /// Start the next interval from `now`, keeping the clock running.
    pub fn rearm(&mut self, now: i64) -> i64 {
        let end_at = deadline(now, self.interval_ms);
        self.cycles = self.cycles.saturating_add(1);
        self.remaining_ms = self.interval_ms;
        self.end_at = Some(end_at);
        self.running = true;
        end_at
    }
}

impl Clocked for CycleBody {
    fn direction(&self) -> Direction {
        Direction::Down
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn display_ms(&self, now: i64) -> u64 {
        read_countdown(self.running, self.end_at, self.remaining_ms, self.interval_ms, now)
    }

    fn start(&mut self, now: i64) -> bool {
        self.countdown().start(now)
    }

    fn pause(&mut self, now: i64) -> bool {
        self.countdown().pause(now)
    }

    fn reset(&mut self) -> bool {
        let fresh = CycleBody {
            warn_at_ms: self.warn_at_ms,
            ..CycleBody::new(self.interval_ms)
        };
        let changed = *self != fresh;
        *self = fresh;
        changed
    }

    fn adjust(&mut self, delta_ms: i64, now: i64) -> bool {
        let current = self.display_ms(now);
        let target = shift(current, delta_ms, self.interval_ms);
        self.countdown().set_remaining(target, now);
        target != current
    }

    fn set_duration(&mut self, interval_ms: u64, now: i64) -> bool {
        if interval_ms == self.interval_ms {
            return false;
        }
        let current = self.display_ms(now);
        self.interval_ms = interval_ms;
        self.warn_at_ms = clamp_warn(self.warn_at_ms, interval_ms);
        let target = if self.running { current } else { interval_ms };
        self.countdown().set_remaining(target, now);
        true
    }

    fn warn_at_ms(&self) -> Option<u64> {
        self.warn_at_ms
    }

    fn set_warn_at(&mut self, warn_at_ms: Option<u64>) -> bool {
        let warn_at_ms = clamp_warn(warn_at_ms, self.interval_ms);
        let changed = self.warn_at_ms != warn_at_ms;
        self.warn_at_ms = warn_at_ms;
        changed
    }
}

impl DualClockBody {
    fn active(&mut self) -> Countdown<'_> {
        let side = self.active_side.index();
        Countdown {
            cap_ms: self.duration_ms,
            remaining_ms: &mut self.sides_ms[side],
            end_at: &mut self.end_at,
            running: &mut self.running,
        }
    }

    /// Hand the clock to the other side. The side giving up the clock keeps
    /// whatever it had left.
    pub fn switch_side(&mut self, now: i64) -> Side {
        let was_running = self.active().pause(now);
        self.active_side = self.active_side.other();
        if was_running {
            self.active().start(now);
        }
        self.active_side
    }

    /// The side whose budget ran out, if any.
    pub fn flagged_side(&self, now: i64) -> Option<Side> {
        [Side::Left, Side::Right].into_iter().find(|side| {
            if *side == self.active_side {
                self.display_ms(now) == 0
            } else {
                self.sides_ms[side.index()] == 0
            }
        })
    }
}

impl Clocked for DualClockBody {
    fn direction(&self) -> Direction {
        Direction::Down
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn display_ms(&self, now: i64) -> u64 {
        read_countdown(
            self.running,
            self.end_at,
            self.side_ms(self.active_side),
            self.duration_ms,
            now,
        )
    }

    fn start(&mut self, now: i64) -> bool {
        // A flagged game stays over until reset.
        if self.flagged_side(now).is_some() {
            return false;
        }
        self.active().start(now)
    }

    fn pause(&mut self, now: i64) -> bool {
        self.active().pause(now)
    }

    fn reset(&mut self) -> bool {
        let fresh = DualClockBody {
            warn_at_ms: self.warn_at_ms,
            ..DualClockBody::new(self.duration_ms)
        };
        let changed = *self != fresh;
        *self = fresh;
        changed
    }

    fn adjust(&mut self, delta_ms: i64, now: i64) -> bool {
        let current = self.display_ms(now);
        let target = shift(current, delta_ms, self.duration_ms);
        self.active().set_remaining(target, now);
        target != current
    }

    fn set_duration(&mut self, duration_ms: u64, now: i64) -> bool {
        if duration_ms == self.duration_ms {
            return false;
        }
        self.pause(now);
        *self = DualClockBody {
            warn_at_ms: clamp_warn(self.warn_at_ms, duration_ms),
            ..DualClockBody::new(duration_ms)
        };
        true
    }

    fn warn_at_ms(&self) -> Option<u64> {
        self.warn_at_ms
    }

    fn set_warn_at(&mut self, warn_at_ms: Option<u64>) -> bool {
        let warn_at_ms = clamp_warn(warn_at_ms, self.duration_ms);
        let changed = self.warn_at_ms != warn_at_ms;
        self.warn_at_ms = warn_at_ms;
        changed
    }
}

impl StopwatchBody {
    /// Upper bound of the elapsed time.
    pub fn max_ms() -> u64 {
        super::policy::policy(super::record::TimerKind::Stopwatch).max_duration_ms
    }

    /// Record a split at `now`. Returns the split, or `None` when the lap
    /// list is full.
    pub fn lap(&mut self, now: i64, max_laps: usize) -> Option<u64> {
        if self.laps.len() >= max_laps {
            return None;
        }
        let split = self.display_ms(now);
        self.laps.push(split);
        Some(split)
    }
}

impl Clocked for StopwatchBody {
    fn direction(&self) -> Direction {
        Direction::Up
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn display_ms(&self, now: i64) -> u64 {
        match (self.running, self.started_at) {
            (true, Some(origin)) => elapsed_at(origin, Self::max_ms(), now),
            _ => self.elapsed_ms.min(Self::max_ms()),
        }
    }

    fn start(&mut self, now: i64) -> bool {
        if self.running {
            return false;
        }
        self.started_at = Some(origin(now, self.elapsed_ms));
        self.running = true;
        true
    }

    fn pause(&mut self, now: i64) -> bool {
        if !self.running {
            return false;
        }
        self.elapsed_ms = self.display_ms(now);
        self.started_at = None;
        self.running = false;
        true
    }

    fn reset(&mut self) -> bool {
        let fresh = StopwatchBody::new();
        let changed = *self != fresh;
        *self = fresh;
        changed
    }
}

impl TimerBody {
    pub fn clock(&self, segment: &SegmentId) -> Option<&dyn Clocked> {
        match (self, segment) {
            (TimerBody::Countdown(b) | TimerBody::Analog(b), SegmentId::Root) => Some(b),
            (TimerBody::Stopwatch(b), SegmentId::Root) => Some(b),
            (TimerBody::Cycle(b), SegmentId::Root) => Some(b),
            (TimerBody::DualClock(b), SegmentId::Root) => Some(b),
            (TimerBody::Multi(m), SegmentId::Sub(id)) => {
                m.timers.get(id).map(|t| &t.clock as &dyn Clocked)
            }
            _ => None,
        }
    }

    pub fn clock_mut(&mut self, segment: &SegmentId) -> Option<&mut dyn Clocked> {
        match (self, segment) {
            (TimerBody::Countdown(b) | TimerBody::Analog(b), SegmentId::Root) => Some(b),
            (TimerBody::Stopwatch(b), SegmentId::Root) => Some(b),
            (TimerBody::Cycle(b), SegmentId::Root) => Some(b),
            (TimerBody::DualClock(b), SegmentId::Root) => Some(b),
            (TimerBody::Multi(m), SegmentId::Sub(id)) => m
                .timers
                .get_mut(id)
                .map(|t| &mut t.clock as &mut dyn Clocked),
            _ => None,
        }
    }

    /// Display for a segment. For the root of a `multi` record this is the
    /// soonest-expiring running sub-timer, or the shortest paused one.
    pub fn display(&self, segment: &SegmentId, now: i64) -> Option<Display> {
        if let (TimerBody::Multi(m), SegmentId::Root) = (self, segment) {
            let displays: Vec<Display> = m.timers.values().map(|t| t.clock.display(now)).collect();
            let running = displays.iter().any(|d| d.running);
            let value_ms = displays
                .iter()
                .filter(|d| d.running || !running)
                .map(|d| d.value_ms)
                .min()
                .unwrap_or(0);
            return Some(Display {
                value_ms,
                direction: Direction::Down,
                running,
            });
        }
        self.clock(segment).map(|c| c.display(now))
    }
}

/// Format a display value the way the timer pages print it.
///
/// Countdowns round up so that a timer with 0.4 s left still reads `00:01`;
/// count-ups truncate.
pub fn format_clock(display: &Display, granularity: Granularity) -> String {
    let step = granularity.step_ms();
    let units = match display.direction {
        Direction::Down => display.value_ms.div_ceil(step),
        Direction::Up => display.value_ms / step,
    };
    let total_ms = units.saturating_mul(step);
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms / 60_000) % 60;
    let seconds = (total_ms / 1_000) % 60;
    let base = if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    };
    match granularity {
        Granularity::Seconds => base,
        Granularity::Centiseconds => format!("{base}.{:02}", (total_ms % 1_000) / 10),
    }
}
