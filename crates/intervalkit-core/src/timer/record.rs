//! Persisted timer records.
//!
//! One [`TimerRecord`] lives under one store key. The `kind` tag selects the
//! body variant; the body decides which snapshot/anchor pair is meaningful.
//! Records only derive `Serialize`: loading goes through the lenient
//! [`Codec`](crate::storage::Codec), which clamps and repairs instead of
//! rejecting.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::policy::{policy, KindPolicy};

/// Concrete timer kind. Several kinds share a [`TimerMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimerKind {
    Countdown,
    Analog,
    Stopwatch,
    Cycle,
    DualClock,
    /// Several named countdowns sharing one record.
    Multi,
}

impl TimerKind {
    pub const ALL: [TimerKind; 6] = [
        TimerKind::Countdown,
        TimerKind::Analog,
        TimerKind::Stopwatch,
        TimerKind::Cycle,
        TimerKind::DualClock,
        TimerKind::Multi,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TimerKind::Countdown => "countdown",
            TimerKind::Analog => "analog",
            TimerKind::Stopwatch => "stopwatch",
            TimerKind::Cycle => "cycle",
            TimerKind::DualClock => "dual-clock",
            TimerKind::Multi => "multi",
        }
    }

    pub fn mode(self) -> TimerMode {
        policy(self).mode
    }

    pub fn policy(self) -> &'static KindPolicy {
        policy(self)
    }
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimerKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown timer kind: {s}"))
    }
}

/// What "counting" and "completion" mean for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimerMode {
    Countdown,
    CountUp,
    RepeatingInterval,
    DualClock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalPrefs {
    pub sound: bool,
    pub flash: bool,
}

impl SignalPrefs {
    pub const ON: SignalPrefs = SignalPrefs {
        sound: true,
        flash: true,
    };
    pub const OFF: SignalPrefs = SignalPrefs {
        sound: false,
        flash: false,
    };
}

/// Countdown state shared by `countdown`, `analog` and each `multi` sub-timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountdownBody {
    pub duration_ms: u64,
    pub remaining_ms: u64,
    pub running: bool,
    /// Deadline while running.
    pub end_at: Option<i64>,
    pub warn_at_ms: Option<u64>,
}

impl CountdownBody {
    pub fn new(duration_ms: u64) -> Self {
        Self {
            duration_ms,
            remaining_ms: duration_ms,
            running: false,
            end_at: None,
            warn_at_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopwatchBody {
    pub elapsed_ms: u64,
    pub running: bool,
    /// Origin while running.
    pub started_at: Option<i64>,
    /// Cumulative split times, oldest first.
    pub laps: Vec<u64>,
}

impl StopwatchBody {
    pub fn new() -> Self {
        Self {
            elapsed_ms: 0,
            running: false,
            started_at: None,
            laps: Vec::new(),
        }
    }
}

impl Default for StopwatchBody {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleBody {
    pub interval_ms: u64,
    pub remaining_ms: u64,
    pub running: bool,
    pub end_at: Option<i64>,
    pub warn_at_ms: Option<u64>,
    /// Completed cycles since the last reset.
    pub cycles: u64,
}

impl CycleBody {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            remaining_ms: interval_ms,
            running: false,
            end_at: None,
            warn_at_ms: None,
            cycles: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }

    pub fn other(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// Two time budgets of which only the active side runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DualClockBody {
    /// Starting budget of each side.
    pub duration_ms: u64,
    pub sides_ms: [u64; 2],
    pub active_side: Side,
    pub running: bool,
    /// Deadline of the active side while running.
    pub end_at: Option<i64>,
    pub warn_at_ms: Option<u64>,
}

impl DualClockBody {
    pub fn new(duration_ms: u64) -> Self {
        Self {
            duration_ms,
            sides_ms: [duration_ms, duration_ms],
            active_side: Side::Left,
            running: false,
            end_at: None,
            warn_at_ms: None,
        }
    }

    pub fn side_ms(&self, side: Side) -> u64 {
        self.sides_ms[side.index()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubTimer {
    pub name: String,
    #[serde(flatten)]
    pub clock: CountdownBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MultiBody {
    pub timers: BTreeMap<String, SubTimer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TimerBody {
    Countdown(CountdownBody),
    Analog(CountdownBody),
    Stopwatch(StopwatchBody),
    Cycle(CycleBody),
    DualClock(DualClockBody),
    Multi(MultiBody),
}

impl TimerBody {
    pub fn kind(&self) -> TimerKind {
        match self {
            TimerBody::Countdown(_) => TimerKind::Countdown,
            TimerBody::Analog(_) => TimerKind::Analog,
            TimerBody::Stopwatch(_) => TimerKind::Stopwatch,
            TimerBody::Cycle(_) => TimerKind::Cycle,
            TimerBody::DualClock(_) => TimerKind::DualClock,
            TimerBody::Multi(_) => TimerKind::Multi,
        }
    }

    /// Every addressable clock in this body.
    pub fn segment_ids(&self) -> Vec<SegmentId> {
        match self {
            TimerBody::Multi(multi) => multi
                .timers
                .keys()
                .map(|id| SegmentId::Sub(id.clone()))
                .collect(),
            _ => vec![SegmentId::Root],
        }
    }

    pub fn is_running(&self) -> bool {
        match self {
            TimerBody::Countdown(b) | TimerBody::Analog(b) => b.running,
            TimerBody::Stopwatch(b) => b.running,
            TimerBody::Cycle(b) => b.running,
            TimerBody::DualClock(b) => b.running,
            TimerBody::Multi(m) => m.timers.values().any(|t| t.clock.running),
        }
    }
}

/// The persisted, versioned state of one timer instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimerRecord {
    pub version: u32,
    #[serde(flatten)]
    pub body: TimerBody,
    pub signal: SignalPrefs,
}

impl TimerRecord {
    pub fn new(body: TimerBody, signal: SignalPrefs) -> Self {
        Self {
            version: policy(body.kind()).schema_version,
            body,
            signal,
        }
    }

    pub fn kind(&self) -> TimerKind {
        self.body.kind()
    }

    pub fn mode(&self) -> TimerMode {
        self.kind().mode()
    }

    pub fn policy(&self) -> &'static KindPolicy {
        policy(self.kind())
    }

    pub fn is_running(&self) -> bool {
        self.body.is_running()
    }
}

/// Addresses one clock inside a record: the record itself, or one sub-timer
/// of a `multi` record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SegmentId {
    Root,
    Sub(String),
}

impl SegmentId {
    pub fn from_sub(sub: Option<&str>) -> Self {
        match sub {
            Some(id) => SegmentId::Sub(id.to_string()),
            None => SegmentId::Root,
        }
    }

    pub fn sub_id(&self) -> Option<&str> {
        match self {
            SegmentId::Root => None,
            SegmentId::Sub(id) => Some(id),
        }
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentId::Root => f.write_str("root"),
            SegmentId::Sub(id) => write!(f, "sub:{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_its_own_name() {
        for kind in TimerKind::ALL {
            assert_eq!(kind.as_str().parse::<TimerKind>().unwrap(), kind);
        }
        assert!("kitchen".parse::<TimerKind>().is_err());
    }

    #[test]
    fn countdown_serializes_to_persisted_shape() {
        let record = TimerRecord::new(
            TimerBody::Countdown(CountdownBody::new(300_000)),
            SignalPrefs::ON,
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["kind"], "countdown");
        assert_eq!(json["durationMs"], 300_000);
        assert_eq!(json["remainingMs"], 300_000);
        assert_eq!(json["running"], false);
        assert!(json["endAt"].is_null());
        assert!(json["warnAtMs"].is_null());
        assert_eq!(json["signal"]["sound"], true);
    }

    #[test]
    fn multi_sub_timers_serialize_flat() {
        let mut multi = MultiBody::default();
        multi.timers.insert(
            "tea".into(),
            SubTimer {
                name: "Tea".into(),
                clock: CountdownBody::new(180_000),
            },
        );
        let record = TimerRecord::new(TimerBody::Multi(multi), SignalPrefs::OFF);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "multi");
        assert_eq!(json["timers"]["tea"]["name"], "Tea");
        assert_eq!(json["timers"]["tea"]["remainingMs"], 180_000);
    }

    #[test]
    fn side_flips() {
        assert_eq!(Side::Left.other(), Side::Right);
        assert_eq!(Side::Right.other().index(), 0);
    }
}
