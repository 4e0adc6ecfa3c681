//! # intervalkit Core Library
//!
//! The timer engine behind the intervalkit timers: countdown, analog,
//! stopwatch, repeating cycle, dual clock, multi-timer and pinned
//! mini-timers. Every operation is available through the `intervalkit` CLI;
//! any other front end is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Timer Engine**: drift-corrected clocks derived from a stored anchor
//!   timestamp and the caller's `now`, driven by a per-kind policy table
//! - **Signals**: at-most-once warning, last-seconds and completion signals
//!   per threshold crossing
//! - **Storage**: lenient versioned codec over a key-value store (in-memory or
//!   SQLite), debounced writes, TOML configuration
//! - **Sync**: every viewer of a key is a tab; tabs re-seed from each other's
//!   writes through change notifications and a poll fallback
//!
//! ## Key Components
//!
//! - [`TimerSession`]: one record's state machine
//! - [`TimerController`]: a tab's live view of one key
//! - [`RenderLoop`]: frame-driven display commits
//! - [`PinnedBoard`]: pinned mini-timers driven by handle
//! - [`Config`]: application configuration management

pub mod adapter;
pub mod controller;
pub mod effects;
pub mod error;
pub mod events;
pub mod render_loop;
pub mod stats;
pub mod storage;
pub mod sync;
pub mod timer;

pub use adapter::{PinnedBoard, PinnedTimerHandle, PinnedView};
pub use controller::{Collaborators, ControllerOptions, TimerController};
pub use effects::{EffectEmitter, SilentEffects};
pub use error::{ConfigError, CoreError, DecodeFailure, EffectError, StoreError};
pub use events::Event;
pub use render_loop::{Frame, LoopControl, RenderLoop};
pub use stats::{SqliteStatsCollector, StatsAction, StatsCollector};
pub use storage::{Codec, Config, KeyValueStore, MemoryStore, RecordStore, SqliteStore};
pub use sync::TabId;
pub use timer::{Action, SegmentId, TimerKind, TimerRecord, TimerSession};
