//! Audio and flash output for signals.
//!
//! The engine only knows tones and colors. Whatever actually plays them
//! implements [`EffectEmitter`]; a failing effect is skipped on its own and
//! never stops the timer.

use std::sync::Mutex;

use tracing::debug;

use crate::error::EffectError;
use crate::events::Event;
use crate::timer::{BeepPattern, SignalPrefs};

pub const WARNING_COLOR: &str = "#f59e0b";
pub const COMPLETE_COLOR: &str = "#ef4444";

/// Sink for beeps and screen flashes.
pub trait EffectEmitter: Send + Sync {
    fn beep(&self, duration_ms: u64, frequency_hz: u32) -> Result<(), EffectError>;

    fn flash(&self, duration_ms: u64, color: &str) -> Result<(), EffectError>;
}

/// Plays nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentEffects;

impl EffectEmitter for SilentEffects {
    fn beep(&self, _duration_ms: u64, _frequency_hz: u32) -> Result<(), EffectError> {
        Ok(())
    }

    fn flash(&self, _duration_ms: u64, _color: &str) -> Result<(), EffectError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectCall {
    Beep { duration_ms: u64, frequency_hz: u32 },
    Flash { duration_ms: u64, color: String },
}

/// Remembers every call; audio can be made to fail.
#[derive(Debug, Default)]
pub struct RecordedEffects {
    calls: Mutex<Vec<EffectCall>>,
    audio_unavailable: bool,
}

impl RecordedEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_audio() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            audio_unavailable: true,
        }
    }

    pub fn calls(&self) -> Vec<EffectCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    fn push(&self, call: EffectCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl EffectEmitter for RecordedEffects {
    fn beep(&self, duration_ms: u64, frequency_hz: u32) -> Result<(), EffectError> {
        if self.audio_unavailable {
            return Err(EffectError::Unavailable("audio"));
        }
        self.push(EffectCall::Beep {
            duration_ms,
            frequency_hz,
        });
        Ok(())
    }

    fn flash(&self, duration_ms: u64, color: &str) -> Result<(), EffectError> {
        self.push(EffectCall::Flash {
            duration_ms,
            color: color.to_string(),
        });
        Ok(())
    }
}

struct Tone {
    duration_ms: u64,
    frequency_hz: u32,
}

const COMPLETE_TONE: Tone = Tone {
    duration_ms: 200,
    frequency_hz: 880,
};
const COMPLETE_REPEATS: usize = 3;
const SINGLE_TONE: Tone = Tone {
    duration_ms: 250,
    frequency_hz: 880,
};
const WARNING_TONE: Tone = Tone {
    duration_ms: 150,
    frequency_hz: 660,
};
const TICK_TONE: Tone = Tone {
    duration_ms: 50,
    frequency_hz: 1_000,
};

fn beep(effects: &dyn EffectEmitter, tone: &Tone) {
    if let Err(e) = effects.beep(tone.duration_ms, tone.frequency_hz) {
        debug!(error = %e, "skipping beep");
    }
}

fn flash(effects: &dyn EffectEmitter, duration_ms: u64, color: &str) {
    if let Err(e) = effects.flash(duration_ms, color) {
        debug!(error = %e, "skipping flash");
    }
}

/// Play the output for a signal event under the record's preferences.
/// Non-signal events play nothing.
pub fn play_signal(effects: &dyn EffectEmitter, event: &Event, prefs: SignalPrefs) {
    match event {
        Event::TimerCompleted { pattern, .. } => {
            if prefs.sound {
                let (tone, repeats) = match pattern {
                    BeepPattern::Multi => (&COMPLETE_TONE, COMPLETE_REPEATS),
                    BeepPattern::Single => (&SINGLE_TONE, 1),
                };
                for _ in 0..repeats {
                    beep(effects, tone);
                }
            }
            if prefs.flash {
                flash(effects, 1_000, COMPLETE_COLOR);
            }
        }
        Event::WarningReached { .. } => {
            if prefs.sound {
                beep(effects, &WARNING_TONE);
            }
            if prefs.flash {
                flash(effects, 500, WARNING_COLOR);
            }
        }
        Event::LastSecondsTick { .. } => {
            if prefs.sound {
                beep(effects, &TICK_TONE);
            }
        }
        _ => {}
    }
}
