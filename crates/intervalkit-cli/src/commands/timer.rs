use clap::Subcommand;
use intervalkit_core::timer::{now_ms, SignalPrefs};
use intervalkit_core::{Action, SegmentId, TimerKind};
use serde_json::json;

use crate::session::{describe, resolve_key, Env};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Print the record and every clock as JSON
    Show,
    /// Start (or resume) the clock
    Start {
        /// Sub-timer id of a multi timer
        #[arg(long)]
        sub: Option<String>,
    },
    /// Pause the clock
    Pause {
        #[arg(long)]
        sub: Option<String>,
    },
    /// Start if paused, pause if running
    Toggle {
        #[arg(long)]
        sub: Option<String>,
    },
    /// Back to the full duration
    Reset {
        #[arg(long)]
        sub: Option<String>,
    },
    /// Move the displayed time by a signed amount
    Adjust {
        /// Milliseconds to add (negative to subtract)
        #[arg(allow_hyphen_values = true)]
        delta_ms: i64,
        #[arg(long)]
        sub: Option<String>,
    },
    /// Change the nominal length (clamped to the kind's range)
    SetDuration {
        duration_ms: u64,
        #[arg(long)]
        sub: Option<String>,
    },
    /// Set the warning threshold; omit to clear it
    WarnAt {
        warn_at_ms: Option<u64>,
        #[arg(long)]
        sub: Option<String>,
    },
    /// Turn sound/flash signals on or off
    Signal {
        #[arg(long)]
        sound: Option<bool>,
        #[arg(long)]
        flash: Option<bool>,
    },
    /// Record a stopwatch split
    Lap,
    /// Hand a dual clock to the other side
    Switch,
    /// Add a sub-timer to a multi timer
    AddSub {
        id: String,
        name: String,
        duration_ms: u64,
    },
    /// Remove a sub-timer from a multi timer
    RemoveSub { id: String },
    /// Print the stored record verbatim
    Export,
    /// Replace the record from a preset/share JSON object
    Import {
        /// Partial record; omitted fields take the kind's defaults
        json: String,
    },
}

pub fn run(
    kind: TimerKind,
    key: Option<String>,
    action: TimerAction,
) -> Result<(), Box<dyn std::error::Error>> {
    let env = Env::open()?;
    let key = resolve_key(kind, key);
    let now = now_ms();

    let action = match action {
        TimerAction::Show => {
            let controller = env.controller(&key, kind, now);
            println!("{}", serde_json::to_string_pretty(&describe(&controller, now))?);
            return Ok(());
        }
        TimerAction::Export => {
            let store = env.record_store();
            let record = store.load_record(&key, kind);
            println!("{}", store.codec().encode(&record)?);
            return Ok(());
        }
        TimerAction::Import { json } => {
            let partial: serde_json::Value = serde_json::from_str(&json)?;
            let store = env.record_store();
            let record = store.codec().apply_partial(kind, &partial);
            if store.save(&key, &record).is_none() {
                return Err(format!("could not write record '{key}'").into());
            }
            println!("{}", serde_json::to_string_pretty(&record)?);
            return Ok(());
        }
        TimerAction::Start { sub } => Action::Start(segment(sub)),
        TimerAction::Pause { sub } => Action::Pause(segment(sub)),
        TimerAction::Toggle { sub } => Action::Toggle(segment(sub)),
        TimerAction::Reset { sub } => Action::Reset(segment(sub)),
        TimerAction::Adjust { delta_ms, sub } => Action::Adjust {
            segment: segment(sub),
            delta_ms,
        },
        TimerAction::SetDuration { duration_ms, sub } => Action::SetDuration {
            segment: segment(sub),
            duration_ms,
        },
        TimerAction::WarnAt { warn_at_ms, sub } => Action::SetWarnAt {
            segment: segment(sub),
            warn_at_ms,
        },
        TimerAction::Signal { sound, flash } => {
            let current = env.record_store().load_record(&key, kind).signal;
            Action::SetSignal(SignalPrefs {
                sound: sound.unwrap_or(current.sound),
                flash: flash.unwrap_or(current.flash),
            })
        }
        TimerAction::Lap => Action::Lap,
        TimerAction::Switch => Action::SwitchSide,
        TimerAction::AddSub {
            id,
            name,
            duration_ms,
        } => Action::AddSubTimer {
            id,
            name,
            duration_ms,
        },
        TimerAction::RemoveSub { id } => Action::RemoveSubTimer { id },
    };

    let mut controller = env.controller(&key, kind, now);
    let events = controller.dispatch(action, now);
    controller.flush();
    let output = json!({
        "events": events,
        "state": describe(&controller, now),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn segment(sub: Option<String>) -> SegmentId {
    SegmentId::from_sub(sub.as_deref())
}
