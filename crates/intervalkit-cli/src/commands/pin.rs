use clap::Subcommand;
use intervalkit_core::storage::BOARD_KEY;
use intervalkit_core::{PinnedBoard, PinnedTimerHandle, TimerKind};

use crate::session::Env;

#[derive(Subcommand)]
pub enum PinAction {
    /// Pin a timer record
    Add {
        /// Store key of the record
        key: String,
        /// Timer kind of the record
        kind: TimerKind,
        /// Name shown on the board
        name: String,
        /// Sub-timer id of a multi timer
        #[arg(long)]
        sub: Option<String>,
    },
    /// Unpin by pin key (`<key>` or `<key>#<sub>`)
    Remove { pin: String },
    /// List pinned handles as JSON
    List,
}

pub fn run(action: PinAction) -> Result<(), Box<dyn std::error::Error>> {
    let env = Env::open()?;
    let mut board = PinnedBoard::open(env.record_store(), BOARD_KEY, env.collaborators());

    match action {
        PinAction::Add {
            key,
            kind,
            name,
            sub,
        } => {
            let mut handle = PinnedTimerHandle::new(key, kind, name);
            if let Some(sub) = sub {
                handle = handle.with_sub(sub);
            }
            let pin_key = handle.pin_key();
            if !board.pin(handle) {
                return Err(format!("already pinned: {pin_key}").into());
            }
            println!("pinned {pin_key}");
        }
        PinAction::Remove { pin } => {
            if !board.unpin(&pin) {
                return Err(format!("not pinned: {pin}").into());
            }
            println!("unpinned {pin}");
        }
        PinAction::List => {
            println!("{}", serde_json::to_string_pretty(board.pins())?);
        }
    }
    Ok(())
}
