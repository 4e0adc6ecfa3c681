use std::time::Duration;

use clap::Args;
use intervalkit_core::render_loop::{LoopControl, RenderLoop};
use intervalkit_core::timer::{format_clock, now_ms};
use intervalkit_core::{SegmentId, TimerKind};
use tracing::debug;

use crate::session::{resolve_key, Env};

#[derive(Args)]
pub struct WatchArgs {
    /// Timer kind
    kind: TimerKind,
    /// Store key (defaults to the kind's own page)
    #[arg(long)]
    key: Option<String>,
    /// Sub-timer id of a multi timer
    #[arg(long)]
    sub: Option<String>,
    /// Stop watching after this many milliseconds
    #[arg(long)]
    for_ms: Option<u64>,
}

pub fn run(args: WatchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    runtime.block_on(watch(args))
}

/// A limit too large for an `i64` span never elapses.
fn limit_reached(for_ms: Option<u64>, started: i64, now: i64) -> bool {
    for_ms.is_some_and(|limit| {
        i64::try_from(limit).is_ok_and(|limit| now.saturating_sub(started) >= limit)
    })
}

async fn watch(args: WatchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let env = Env::open()?;
    let key = resolve_key(args.kind, args.key);
    let segment = SegmentId::from_sub(args.sub.as_deref());
    let started = now_ms();
    let mut controller = env.controller(&key, args.kind, started);
    let granularity = controller.session().policy().granularity;

    let Some(mut frames) = RenderLoop::start(&controller, segment.clone()) else {
        if let Some(display) = controller.display(&segment, started) {
            println!("{}", format_clock(&display, granularity));
        }
        return Ok(());
    };

    let mut ticker =
        tokio::time::interval(Duration::from_millis(env.config.frame_interval_ms.max(1)));
    loop {
        ticker.tick().await;
        let now = now_ms();
        let frame = frames.frame(&mut controller, now);
        for event in &frame.events {
            println!("{}", serde_json::to_string(event)?);
        }
        if let Some(display) = frame.commit {
            println!("{}", format_clock(&display, granularity));
        }
        if frame.control == LoopControl::Stop {
            break;
        }
        if limit_reached(args.for_ms, started, now) {
            break;
        }
    }
    drop(frames);
    debug!(key = %key, "watch loop stopped");
    controller.close();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_measured_from_start() {
        assert!(!limit_reached(None, 0, i64::MAX));
        assert!(!limit_reached(Some(5_000), 1_000, 5_999));
        assert!(limit_reached(Some(5_000), 1_000, 6_000));
    }

    #[test]
    fn huge_limit_does_not_wrap_negative() {
        assert!(!limit_reached(Some(u64::MAX), 1_000, 2_000));
        assert!(!limit_reached(Some(i64::MAX as u64 + 1), 0, i64::MAX));
    }
}
