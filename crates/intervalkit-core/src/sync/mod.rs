//! Cross-tab synchronization.
//!
//! Every viewer of a record key is a tab with its own [`TabId`]. Tabs never
//! talk to each other directly: one writes the store, the others notice
//! through a [`RecordWatcher`] and replace their state wholesale.

mod tab_id;
mod watcher;

pub use tab_id::{TabId, TabIdError};
pub use watcher::{RecordWatcher, RemoteChange};
