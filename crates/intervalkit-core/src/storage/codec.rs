//! Versioned record codec.
//!
//! Encoding is plain `serde_json`. Decoding never fails: it walks the JSON
//! value field by field, clamps numbers into the kind's legal range, coerces
//! booleans written as `0/1` or `"true"/"false"`, and repairs the
//! snapshot/anchor invariant. Anything it cannot make sense of becomes the
//! kind's default record.
//!
//! Records written before the `kind` tag existed are recognized by their
//! shape:
//!
//! | fields present              | shape          | kinds                      |
//! |-----------------------------|----------------|----------------------------|
//! | `timers`                    | multi          | `multi`                    |
//! | `sidesMs`                   | dual           | `dual-clock`               |
//! | `elapsedMs` + `startedAt`   | count-up       | `stopwatch`                |
//! | `remainingMs` + `endAt`     | countdown-like | `countdown` `analog` `cycle` |

use serde_json::{Map, Value};

use crate::error::DecodeFailure;
use crate::timer::{
    policy, CountdownBody, CycleBody, DualClockBody, KindPolicy, MultiBody, Side, SignalPrefs,
    StopwatchBody, SubTimer, TimerBody, TimerKind, TimerRecord, FIRST_RUN_SIGNAL, MISSING_SIGNAL,
};

/// How a stored value became a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// Nothing stored yet; first-run default.
    Missing,
    Clean,
    /// Decoded after clamping, coercing or anchor repair.
    Repaired,
    /// Decoded from a legacy layout; should be written back in the current one.
    Migrated,
    Defaulted(DecodeFailure),
}

impl DecodeOutcome {
    pub fn needs_save(&self) -> bool {
        matches!(self, DecodeOutcome::Migrated)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub record: TimerRecord,
    pub outcome: DecodeOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codec {
    first_run_signal: SignalPrefs,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(FIRST_RUN_SIGNAL)
    }
}

impl Codec {
    pub fn new(first_run_signal: SignalPrefs) -> Self {
        Self { first_run_signal }
    }

    pub fn default_record(&self, kind: TimerKind) -> TimerRecord {
        policy(kind).default_record(self.first_run_signal)
    }

    pub fn encode(&self, record: &TimerRecord) -> Result<String, serde_json::Error> {
        serde_json::to_string(record)
    }

    /// Decode a raw stored value, `None` meaning nothing was stored.
    pub fn decode(&self, raw: Option<&str>, kind: TimerKind) -> Decoded {
        let Some(raw) = raw else {
            return Decoded {
                record: self.default_record(kind),
                outcome: DecodeOutcome::Missing,
            };
        };
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => self.decode_value(&value, kind),
            Err(e) => self.defaulted(kind, DecodeFailure::InvalidJson(e.to_string())),
        }
    }

    pub fn decode_value(&self, value: &Value, kind: TimerKind) -> Decoded {
        let Some(obj) = value.as_object() else {
            return self.defaulted(kind, DecodeFailure::NotAnObject);
        };
        let policy = policy(kind);
        let version = obj.get("version").and_then(Value::as_u64);
        let array_multi = kind == TimerKind::Multi
            && version == Some(1)
            && obj.get("timers").is_some_and(Value::is_array);

        let tagged = match obj.get("kind") {
            Some(tag) => {
                let found = tag.as_str().map_or_else(|| tag.to_string(), str::to_string);
                if found != kind.as_str() {
                    return self.defaulted(
                        kind,
                        DecodeFailure::KindMismatch {
                            found,
                            expected: kind.as_str().to_string(),
                        },
                    );
                }
                true
            }
            None => {
                if !sniff(obj).is_some_and(|shape| shape.fits(kind)) {
                    return self.defaulted(
                        kind,
                        DecodeFailure::UnrecognizedShape(kind.as_str().to_string()),
                    );
                }
                false
            }
        };

        if version != Some(u64::from(policy.schema_version)) && !array_multi {
            return self.defaulted(
                kind,
                DecodeFailure::VersionMismatch {
                    found: version,
                    expected: policy.schema_version,
                },
            );
        }

        let mut fields = Fields::new(obj);
        let body = fields.body(policy);
        let signal = fields.signal();
        let outcome = if !tagged || array_multi {
            DecodeOutcome::Migrated
        } else if fields.repaired {
            DecodeOutcome::Repaired
        } else {
            DecodeOutcome::Clean
        };
        Decoded {
            record: TimerRecord::new(body, signal),
            outcome,
        }
    }

    /// Build a record from a preset or share link: given fields are clamped,
    /// omitted ones take the kind's defaults, omitted signals are off.
    pub fn apply_partial(&self, kind: TimerKind, partial: &Value) -> TimerRecord {
        let empty = Map::new();
        let obj = partial.as_object().unwrap_or(&empty);
        let mut fields = Fields::new(obj);
        let body = fields.body(policy(kind));
        let signal = fields.signal();
        TimerRecord::new(body, signal)
    }

    /// Decode one entry of a `multi` record's `timers` map.
    pub fn decode_sub_timer(&self, id: &str, value: &Value) -> Option<SubTimer> {
        let obj = value.as_object()?;
        Some(Fields::new(obj).sub_timer(id))
    }

    fn defaulted(&self, kind: TimerKind, failure: DecodeFailure) -> Decoded {
        Decoded {
            record: self.default_record(kind),
            outcome: DecodeOutcome::Defaulted(failure),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    CountdownLike,
    CountUp,
    Dual,
    Multi,
}

impl Shape {
    fn fits(self, kind: TimerKind) -> bool {
        matches!(
            (self, kind),
            (
                Shape::CountdownLike,
                TimerKind::Countdown | TimerKind::Analog | TimerKind::Cycle
            ) | (Shape::CountUp, TimerKind::Stopwatch)
                | (Shape::Dual, TimerKind::DualClock)
                | (Shape::Multi, TimerKind::Multi)
        )
    }
}

fn sniff(obj: &Map<String, Value>) -> Option<Shape> {
    let has = |field: &str| obj.contains_key(field);
    if has("timers") {
        Some(Shape::Multi)
    } else if has("sidesMs") {
        Some(Shape::Dual)
    } else if has("elapsedMs") && has("startedAt") {
        Some(Shape::CountUp)
    } else if has("remainingMs") && has("endAt") {
        Some(Shape::CountdownLike)
    } else {
        None
    }
}

/// Milliseconds from a JSON value, with whether it was already an exact
/// non-negative integer.
fn as_ms(value: &Value) -> Option<(u64, bool)> {
    let from_float = |f: f64| {
        if !f.is_finite() {
            None
        } else if f <= 0.0 {
            Some((0, false))
        } else {
            Some((f.round() as u64, false))
        }
    };
    match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Some((u, true))
            } else if n.as_i64().is_some() {
                Some((0, false))
            } else {
                n.as_f64().and_then(from_float)
            }
        }
        Value::String(s) => s.trim().parse::<f64>().ok().and_then(from_float),
        _ => None,
    }
}

fn as_flag(value: &Value) -> Option<(bool, bool)> {
    match value {
        Value::Bool(b) => Some((*b, true)),
        Value::Number(n) => match n.as_u64() {
            Some(0) => Some((false, false)),
            Some(1) => Some((true, false)),
            _ => None,
        },
        Value::String(s) => match s.trim() {
            "true" | "1" => Some((true, false)),
            "false" | "0" => Some((false, false)),
            _ => None,
        },
        _ => None,
    }
}

/// Lenient field reader over one JSON object. Every substitution sets
/// `repaired`.
struct Fields<'a> {
    obj: &'a Map<String, Value>,
    repaired: bool,
}

impl<'a> Fields<'a> {
    fn new(obj: &'a Map<String, Value>) -> Self {
        Self {
            obj,
            repaired: false,
        }
    }

    fn present(&self, field: &str) -> Option<&'a Value> {
        match self.obj.get(field) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value),
        }
    }

    fn ms(&mut self, field: &str, min: u64, max: u64, default: u64) -> u64 {
        match self.present(field).and_then(as_ms) {
            Some((value, exact)) => {
                let clamped = value.clamp(min, max);
                if !exact || clamped != value {
                    self.repaired = true;
                }
                clamped
            }
            None => {
                self.repaired = true;
                default
            }
        }
    }

    fn opt_ms(&mut self, field: &str, max: u64) -> Option<u64> {
        let value = self.present(field)?;
        match as_ms(value) {
            Some((value, exact)) => {
                let clamped = value.min(max);
                if !exact || clamped != value {
                    self.repaired = true;
                }
                Some(clamped)
            }
            None => {
                self.repaired = true;
                None
            }
        }
    }

    fn timestamp(&mut self, field: &str) -> Option<i64> {
        let value = self.present(field)?;
        let parsed = match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64)),
            Value::String(s) => {
                self.repaired = true;
                s.trim().parse::<i64>().ok()
            }
            _ => None,
        };
        if parsed.is_none() {
            self.repaired = true;
        }
        parsed
    }

    fn flag(&mut self, field: &str, default: bool) -> bool {
        match self.present(field).and_then(as_flag) {
            Some((value, exact)) => {
                if !exact {
                    self.repaired = true;
                }
                value
            }
            None => {
                self.repaired = true;
                default
            }
        }
    }

    fn text(&mut self, field: &str, default: &str) -> String {
        match self.present(field) {
            Some(Value::String(s)) => s.clone(),
            _ => {
                self.repaired = true;
                default.to_string()
            }
        }
    }

    /// `running` plus its anchor, with exactly one of snapshot and anchor
    /// left authoritative.
    fn anchor(&mut self, field: &str) -> (bool, Option<i64>) {
        let running = self.flag("running", false);
        let anchor = self.timestamp(field);
        match (running, anchor) {
            (true, None) | (false, Some(_)) => {
                self.repaired = true;
                (false, None)
            }
            other => other,
        }
    }

    fn signal(&mut self) -> SignalPrefs {
        match self.obj.get("signal") {
            Some(Value::Object(obj)) => {
                let mut fields = Fields::new(obj);
                let signal = SignalPrefs {
                    sound: fields.flag("sound", MISSING_SIGNAL.sound),
                    flash: fields.flag("flash", MISSING_SIGNAL.flash),
                };
                self.repaired |= fields.repaired;
                signal
            }
            _ => {
                self.repaired = true;
                MISSING_SIGNAL
            }
        }
    }

    fn body(&mut self, policy: &KindPolicy) -> TimerBody {
        match policy.kind {
            TimerKind::Countdown => TimerBody::Countdown(self.countdown(policy)),
            TimerKind::Analog => TimerBody::Analog(self.countdown(policy)),
            TimerKind::Stopwatch => TimerBody::Stopwatch(self.stopwatch(policy)),
            TimerKind::Cycle => TimerBody::Cycle(self.cycle(policy)),
            TimerKind::DualClock => TimerBody::DualClock(self.dual_clock(policy)),
            TimerKind::Multi => TimerBody::Multi(self.multi(policy)),
        }
    }

    fn duration(&mut self, policy: &KindPolicy) -> u64 {
        self.ms(
            policy.duration_field,
            policy.min_duration_ms,
            policy.max_duration_ms,
            policy.default_duration_ms,
        )
    }

    fn countdown(&mut self, policy: &KindPolicy) -> CountdownBody {
        let duration_ms = self.duration(policy);
        let remaining_ms = self.ms("remainingMs", 0, duration_ms, duration_ms);
        let (running, end_at) = self.anchor("endAt");
        let warn_at_ms = self.opt_ms("warnAtMs", duration_ms);
        CountdownBody {
            duration_ms,
            remaining_ms,
            running,
            end_at,
            warn_at_ms,
        }
    }

    fn cycle(&mut self, policy: &KindPolicy) -> CycleBody {
        let interval_ms = self.duration(policy);
        let remaining_ms = self.ms("remainingMs", 0, interval_ms, interval_ms);
        let (running, end_at) = self.anchor("endAt");
        let warn_at_ms = self.opt_ms("warnAtMs", interval_ms);
        let cycles = self.ms("cycles", 0, u64::MAX, 0);
        CycleBody {
            interval_ms,
            remaining_ms,
            running,
            end_at,
            warn_at_ms,
            cycles,
        }
    }

    fn stopwatch(&mut self, policy: &KindPolicy) -> StopwatchBody {
        let max = policy.max_duration_ms;
        let elapsed_ms = self.ms("elapsedMs", 0, max, 0);
        let (running, started_at) = self.anchor("startedAt");
        let laps = match self.present("laps") {
            Some(Value::Array(items)) => {
                if items.len() > policy.max_laps {
                    self.repaired = true;
                }
                let mut laps = Vec::with_capacity(items.len().min(policy.max_laps));
                for item in items.iter().take(policy.max_laps) {
                    match as_ms(item) {
                        Some((split, exact)) => {
                            if !exact || split > max {
                                self.repaired = true;
                            }
                            laps.push(split.min(max));
                        }
                        None => self.repaired = true,
                    }
                }
                laps
            }
            _ => {
                self.repaired = true;
                Vec::new()
            }
        };
        StopwatchBody {
            elapsed_ms,
            running,
            started_at,
            laps,
        }
    }

    fn dual_clock(&mut self, policy: &KindPolicy) -> DualClockBody {
        let duration_ms = self.duration(policy);
        let sides_ms = match self.present("sidesMs") {
            Some(Value::Array(items)) if items.len() == 2 => {
                let mut sides = [duration_ms; 2];
                for (side, item) in sides.iter_mut().zip(items) {
                    match as_ms(item) {
                        Some((ms, exact)) => {
                            if !exact || ms > duration_ms {
                                self.repaired = true;
                            }
                            *side = ms.min(duration_ms);
                        }
                        None => self.repaired = true,
                    }
                }
                sides
            }
            _ => {
                self.repaired = true;
                [duration_ms; 2]
            }
        };
        let active_side = match self.present("activeSide").and_then(Value::as_str) {
            Some("left") => Side::Left,
            Some("right") => Side::Right,
            _ => {
                self.repaired = true;
                Side::Left
            }
        };
        let (running, end_at) = self.anchor("endAt");
        let warn_at_ms = self.opt_ms("warnAtMs", duration_ms);
        DualClockBody {
            duration_ms,
            sides_ms,
            active_side,
            running,
            end_at,
            warn_at_ms,
        }
    }

    fn sub_timer(&mut self, id: &str) -> SubTimer {
        let name = self.text("name", id);
        let clock = self.countdown(policy(TimerKind::Multi));
        SubTimer { name, clock }
    }

    fn multi(&mut self, policy: &KindPolicy) -> MultiBody {
        let mut multi = MultiBody::default();
        let entries: Vec<(String, &Value)> = match self.present("timers") {
            Some(Value::Object(map)) => map.iter().map(|(id, v)| (id.clone(), v)).collect(),
            // Version 1 kept sub-timers in an array.
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(index, v)| {
                    let id = v
                        .get("id")
                        .and_then(Value::as_str)
                        .map_or_else(|| index.to_string(), str::to_string);
                    (id, v)
                })
                .collect(),
            _ => {
                self.repaired = true;
                Vec::new()
            }
        };
        for (id, value) in entries {
            if multi.timers.len() >= policy.max_sub_timers || multi.timers.contains_key(&id) {
                self.repaired = true;
                continue;
            }
            match value.as_object() {
                Some(obj) => {
                    let mut fields = Fields::new(obj);
                    let sub = fields.sub_timer(&id);
                    self.repaired |= fields.repaired;
                    multi.timers.insert(id, sub);
                }
                None => self.repaired = true,
            }
        }
        multi
    }
}
