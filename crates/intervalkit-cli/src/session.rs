//! Shared setup for commands: config, database, stores and controllers.

use std::sync::Arc;

use intervalkit_core::error::Result;
use intervalkit_core::storage::record_key;
use intervalkit_core::timer::format_clock;
use intervalkit_core::{
    Codec, Collaborators, Config, ControllerOptions, EffectEmitter, RecordStore,
    SqliteStatsCollector, SqliteStore, TimerController, TimerKind,
};
use serde_json::{json, Value};

use crate::terminal::TerminalEffects;

pub struct Env {
    pub config: Config,
    pub db: Arc<SqliteStore>,
}

impl Env {
    pub fn open() -> Result<Self> {
        let config = Config::load_or_default();
        let db = Arc::new(SqliteStore::open()?);
        Ok(Self { config, db })
    }

    pub fn record_store(&self) -> RecordStore {
        RecordStore::new(self.db.clone(), Codec::new(self.config.first_run_signal()))
    }

    pub fn collaborators(&self) -> Collaborators {
        let effects: Arc<dyn EffectEmitter> = Arc::new(TerminalEffects);
        Collaborators {
            effects,
            stats: Arc::new(SqliteStatsCollector::new(self.db.clone())),
        }
    }

    pub fn options(&self) -> ControllerOptions {
        ControllerOptions::from_config(&self.config)
    }

    pub fn controller(&self, key: &str, kind: TimerKind, now: i64) -> TimerController {
        TimerController::open(
            key,
            kind,
            self.record_store(),
            self.collaborators(),
            &self.options(),
            now,
        )
    }
}

pub fn resolve_key(kind: TimerKind, key: Option<String>) -> String {
    key.unwrap_or_else(|| record_key(kind))
}

/// The record plus every clock's current display.
pub fn describe(controller: &TimerController, now: i64) -> Value {
    let granularity = controller.session().policy().granularity;
    let clocks: Vec<Value> = controller
        .record()
        .body
        .segment_ids()
        .into_iter()
        .filter_map(|segment| {
            let display = controller.display(&segment, now)?;
            Some(json!({
                "segment": segment.to_string(),
                "display": display,
                "formatted": format_clock(&display, granularity),
            }))
        })
        .collect();
    json!({
        "key": controller.key(),
        "record": controller.record(),
        "clocks": clocks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bell_rings_even_when_first_run_default_is_silent() {
        let mut config = Config::default();
        config.signals.sound = false;
        let env = Env {
            config,
            db: Arc::new(SqliteStore::open_memory().unwrap()),
        };
        assert!(!env.config.first_run_signal().sound);
        assert!(env.collaborators().effects.beep(200, 880).is_ok());
    }
}
