pub mod clock;
mod engine;
mod policy;
mod record;
mod signal;

pub use clock::{format_clock, now_ms, Clocked, Direction, Display};
pub use engine::{Action, TimerSession};
pub(crate) use engine::nominal_duration;
pub use policy::{
    policy, BeepPattern, CompletionPolicy, Granularity, KindPolicy, FIRST_RUN_SIGNAL,
    MISSING_SIGNAL,
};
pub use record::{
    CountdownBody, CycleBody, DualClockBody, MultiBody, SegmentId, Side, SignalPrefs,
    StopwatchBody, SubTimer, TimerBody, TimerKind, TimerMode, TimerRecord,
};
pub use signal::{apply_completion, CompletionOutcome, Crossings, SignalPhase, SignalTracker};
