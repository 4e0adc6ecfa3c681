mod codec;
mod config;
pub mod database;
mod debounce;
mod memory;
mod record_store;

pub use codec::{Codec, DecodeOutcome, Decoded};
pub use config::{Config, SignalsConfig};
pub use database::{KindStats, SqliteStore};
pub use debounce::DebouncedWriter;
pub use memory::MemoryStore;
pub use record_store::{Loaded, RecordStore};

use std::path::PathBuf;

use tokio::sync::broadcast;

use crate::error::StoreError;
use crate::sync::TabId;

/// Returns `~/.config/intervalkit[-dev]/` based on INTERVALKIT_ENV.
///
/// Set INTERVALKIT_ENV=dev to use the development data directory, or
/// INTERVALKIT_DATA_DIR to point somewhere else entirely.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let dir = match std::env::var_os("INTERVALKIT_DATA_DIR") {
        Some(custom) => PathBuf::from(custom),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("INTERVALKIT_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("intervalkit-dev")
            } else {
                base_dir.join("intervalkit")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// A change written to a shared store, as seen by every other viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    /// New raw value, `None` when the key was removed.
    pub value: Option<String>,
    pub origin: TabId,
}

/// String key-value store shared by every tab.
///
/// Stores that can push change notifications return a feed from
/// [`subscribe`](KeyValueStore::subscribe); the others are observed by
/// polling.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str, origin: &TabId) -> Result<(), StoreError>;

    fn remove(&self, key: &str, origin: &TabId) -> Result<(), StoreError>;

    fn keys(&self) -> Result<Vec<String>, StoreError>;

    fn subscribe(&self) -> Option<broadcast::Receiver<StorageEvent>> {
        None
    }
}

/// Store key for a timer page's record.
pub fn record_key(kind: crate::timer::TimerKind) -> String {
    format!("intervalkit:{kind}")
}

/// Store key for the pinned-timer board.
pub const BOARD_KEY: &str = "intervalkit:pins";
