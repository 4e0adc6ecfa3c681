pub mod board;
pub mod config;
pub mod pin;
pub mod stats;
pub mod timer;
pub mod watch;
