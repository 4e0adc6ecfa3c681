use clap::Subcommand;
use intervalkit_core::storage::BOARD_KEY;
use intervalkit_core::timer::now_ms;
use intervalkit_core::{Event, PinnedBoard};
use serde_json::json;

use crate::session::Env;

#[derive(Subcommand)]
pub enum BoardAction {
    /// Every pin with its current display
    Show,
    /// Complete expired pins and report the signals they fired
    Refresh,
    /// Start a pinned timer
    Start { pin: String },
    /// Pause a pinned timer
    Pause { pin: String },
    /// Reset a pinned timer
    Reset { pin: String },
}

pub fn run(action: BoardAction) -> Result<(), Box<dyn std::error::Error>> {
    let env = Env::open()?;
    let mut board = PinnedBoard::open(env.record_store(), BOARD_KEY, env.collaborators());
    let now = now_ms();

    let (pin, events) = match action {
        BoardAction::Show => {
            println!("{}", serde_json::to_string_pretty(&board.views(now))?);
            return Ok(());
        }
        BoardAction::Refresh => {
            let events = board.refresh(now);
            let output = json!({ "events": events, "pins": board.views(now) });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }
        BoardAction::Start { pin } => {
            let events = board.start(&pin, now);
            (pin, events)
        }
        BoardAction::Pause { pin } => {
            let events = board.pause(&pin, now);
            (pin, events)
        }
        BoardAction::Reset { pin } => {
            let events = board.reset(&pin, now);
            (pin, events)
        }
    };

    let events = events.ok_or_else(|| format!("not pinned: {pin}"))?;
    let changed = events.iter().any(|e| {
        matches!(
            e,
            Event::TimerStarted { .. } | Event::TimerPaused { .. } | Event::TimerReset { .. }
        )
    });
    let view = board
        .views(now)
        .into_iter()
        .find(|v| v.handle.pin_key() == pin);
    let output = json!({ "changed": changed, "events": events, "pin": view });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
