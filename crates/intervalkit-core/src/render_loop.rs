//! Render-sync loop.
//!
//! A [`RenderLoop`] is driven by whatever frame source the host has (a tokio
//! interval in the CLI). Each frame lets the controller observe the clocks,
//! then hands out a new display value only when the visible bucket changed.
//! The loop holds its controller's [`LoopSlot`] for as long as it lives, so a
//! record never has two loops at once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::controller::TimerController;
use crate::events::Event;
use crate::timer::{Direction, Display, Granularity, SegmentId};

/// At most one loop per controller.
#[derive(Debug, Clone, Default)]
pub struct LoopSlot(Arc<AtomicBool>);

impl LoopSlot {
    /// Claim the slot. `None` while another loop holds it.
    pub fn acquire(&self) -> Option<LoopGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| LoopGuard(Arc::clone(&self.0)))
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Releases the slot on drop.
#[derive(Debug)]
pub struct LoopGuard(Arc<AtomicBool>);

impl Drop for LoopGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Stop,
}

/// Result of one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// New value to show, if the visible bucket changed.
    pub commit: Option<Display>,
    pub events: Vec<Event>,
    pub control: LoopControl,
}

#[derive(Debug)]
pub struct RenderLoop {
    _guard: LoopGuard,
    segment: SegmentId,
    granularity: Granularity,
    last_bucket: Option<u64>,
}

impl RenderLoop {
    /// Start a loop for one segment of a running record. Returns `None` if
    /// nothing is running or a loop is already active.
    pub fn start(controller: &TimerController, segment: SegmentId) -> Option<Self> {
        if !controller.is_running() {
            return None;
        }
        let guard = controller.loop_slot().acquire()?;
        Some(Self {
            _guard: guard,
            segment,
            granularity: controller.session().policy().granularity,
            last_bucket: None,
        })
    }

    pub fn segment(&self) -> &SegmentId {
        &self.segment
    }

    pub fn frame(&mut self, controller: &mut TimerController, now: i64) -> Frame {
        let events = controller.tick(now);
        let commit = controller
            .display(&self.segment, now)
            .filter(|display| {
                let bucket = bucket(display, self.granularity);
                let changed = self.last_bucket != Some(bucket);
                self.last_bucket = Some(bucket);
                changed
            });
        let control = if controller.is_running() {
            LoopControl::Continue
        } else {
            LoopControl::Stop
        };
        Frame {
            commit,
            events,
            control,
        }
    }
}

/// The visible unit a display value falls in. Countdowns round up so the
/// last partial second still shows as 1.
pub fn bucket(display: &Display, granularity: Granularity) -> u64 {
    let step = granularity.step_ms();
    match display.direction {
        Direction::Down => display.value_ms.div_ceil(step),
        Direction::Up => display.value_ms / step,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::controller::{Collaborators, ControllerOptions};
    use crate::storage::{Codec, MemoryStore, RecordStore};
    use crate::timer::{Action, TimerKind};

    fn controller(kind: TimerKind) -> TimerController {
        let store = RecordStore::new(Arc::new(MemoryStore::new()), Codec::default());
        TimerController::open(
            "k",
            kind,
            store,
            Collaborators::default(),
            &ControllerOptions::default(),
            0,
        )
    }

    #[test]
    fn slot_admits_one_loop_until_released() {
        let slot = LoopSlot::default();
        let guard = slot.acquire().unwrap();
        assert!(slot.is_active());
        assert!(slot.acquire().is_none());
        drop(guard);
        assert!(!slot.is_active());
        assert!(slot.acquire().is_some());
    }

    #[test]
    fn paused_record_gets_no_loop() {
        let tab = controller(TimerKind::Countdown);
        assert!(RenderLoop::start(&tab, SegmentId::Root).is_none());
    }

    #[test]
    fn second_start_is_refused() {
        let mut tab = controller(TimerKind::Countdown);
        tab.dispatch(Action::Start(SegmentId::Root), 0);
        let first = RenderLoop::start(&tab, SegmentId::Root).unwrap();
        assert!(RenderLoop::start(&tab, SegmentId::Root).is_none());
        drop(first);
        assert!(RenderLoop::start(&tab, SegmentId::Root).is_some());
    }

    #[test]
    fn commits_only_on_whole_second_change() {
        let mut tab = controller(TimerKind::Countdown);
        tab.dispatch(Action::Start(SegmentId::Root), 0);
        let mut frames = RenderLoop::start(&tab, SegmentId::Root).unwrap();

        let first = frames.frame(&mut tab, 16);
        assert_eq!(first.commit.unwrap().value_ms, 299_984);
        assert!(frames.frame(&mut tab, 500).commit.is_none());
        assert!(frames.frame(&mut tab, 999).commit.is_none());
        let next = frames.frame(&mut tab, 1_001).commit.unwrap();
        assert_eq!(bucket(&next, Granularity::Seconds), 299);
    }

    #[test]
    fn stopwatch_commits_per_centisecond() {
        let mut tab = controller(TimerKind::Stopwatch);
        tab.dispatch(Action::Start(SegmentId::Root), 0);
        let mut frames = RenderLoop::start(&tab, SegmentId::Root).unwrap();
        assert!(frames.frame(&mut tab, 5).commit.is_some());
        assert!(frames.frame(&mut tab, 9).commit.is_none());
        assert!(frames.frame(&mut tab, 10).commit.is_some());
    }

    #[test]
    fn completion_happens_in_the_frame_that_sees_zero() {
        let mut tab = controller(TimerKind::Countdown);
        tab.dispatch(Action::Start(SegmentId::Root), 0);
        let mut frames = RenderLoop::start(&tab, SegmentId::Root).unwrap();
        frames.frame(&mut tab, 299_500);

        let last = frames.frame(&mut tab, 300_020);
        assert!(last
            .events
            .iter()
            .any(|e| matches!(e, Event::TimerCompleted { .. })));
        assert_eq!(last.commit.unwrap().value_ms, 0);
        assert_eq!(last.control, LoopControl::Stop);
        assert!(!tab.is_running());
    }

    #[test]
    fn pause_stops_the_loop_on_next_frame() {
        let mut tab = controller(TimerKind::Cycle);
        tab.dispatch(Action::Start(SegmentId::Root), 0);
        let mut frames = RenderLoop::start(&tab, SegmentId::Root).unwrap();
        assert_eq!(frames.frame(&mut tab, 100).control, LoopControl::Continue);
        tab.dispatch(Action::Pause(SegmentId::Root), 200);
        assert_eq!(frames.frame(&mut tab, 250).control, LoopControl::Stop);
    }

    #[test]
    fn countdown_bucket_rounds_up() {
        let display = Display {
            value_ms: 400,
            direction: Direction::Down,
            running: true,
        };
        assert_eq!(bucket(&display, Granularity::Seconds), 1);
    }
}
