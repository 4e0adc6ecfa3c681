//! Usage statistics.
//!
//! The engine reports `(kind, action, durationMs?)` on every start, pause and
//! completion. Collectors are infallible from the engine's side: a collector
//! that cannot record logs and moves on.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::events::Event;
use crate::storage::SqliteStore;
use crate::timer::TimerKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsAction {
    Start,
    Pause,
    Complete,
}

impl StatsAction {
    pub fn as_str(self) -> &'static str {
        match self {
            StatsAction::Start => "start",
            StatsAction::Pause => "pause",
            StatsAction::Complete => "complete",
        }
    }
}

pub trait StatsCollector: Send + Sync {
    fn record(&self, kind: TimerKind, action: StatsAction, duration_ms: Option<u64>);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStats;

impl StatsCollector for NoStats {
    fn record(&self, _kind: TimerKind, _action: StatsAction, _duration_ms: Option<u64>) {}
}

/// Writes to the `timer_stats` table.
pub struct SqliteStatsCollector {
    db: Arc<SqliteStore>,
}

impl SqliteStatsCollector {
    pub fn new(db: Arc<SqliteStore>) -> Self {
        Self { db }
    }
}

impl StatsCollector for SqliteStatsCollector {
    fn record(&self, kind: TimerKind, action: StatsAction, duration_ms: Option<u64>) {
        if let Err(e) = self.db.record_stat(kind, action, duration_ms, Utc::now()) {
            debug!(%kind, action = action.as_str(), error = %e, "stats not recorded");
        }
    }
}

/// The stats entry an event produces, if any.
pub fn stats_entry(event: &Event) -> Option<(TimerKind, StatsAction, Option<u64>)> {
    match event {
        Event::TimerStarted { kind, value_ms, .. } => {
            Some((*kind, StatsAction::Start, Some(*value_ms)))
        }
        Event::TimerPaused { kind, value_ms, .. } => {
            Some((*kind, StatsAction::Pause, Some(*value_ms)))
        }
        Event::TimerCompleted {
            kind, duration_ms, ..
        } => Some((*kind, StatsAction::Complete, Some(*duration_ms))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::at;

    #[test]
    fn only_start_pause_complete_are_counted() {
        let started = Event::TimerStarted {
            kind: TimerKind::Stopwatch,
            segment: None,
            value_ms: 0,
            at: at(0),
        };
        assert_eq!(
            stats_entry(&started),
            Some((TimerKind::Stopwatch, StatsAction::Start, Some(0)))
        );
        let reset = Event::TimerReset {
            kind: TimerKind::Stopwatch,
            segment: None,
            at: at(0),
        };
        assert_eq!(stats_entry(&reset), None);
    }

    #[test]
    fn sqlite_collector_writes_rows() {
        let db = Arc::new(SqliteStore::open_memory().unwrap());
        let collector = SqliteStatsCollector::new(db.clone());
        collector.record(TimerKind::Analog, StatsAction::Complete, Some(900_000));
        let summary = db.stats_summary(None).unwrap();
        assert_eq!(summary[0].kind, "analog");
        assert_eq!(summary[0].completed_ms, 900_000);
    }
}
