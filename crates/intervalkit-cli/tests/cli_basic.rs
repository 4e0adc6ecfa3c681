//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary against a throwaway data directory and
//! verify its JSON output.

use std::path::Path;
use std::process::Command;

use serde_json::Value;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(dir: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_intervalkit"))
        .args(args)
        .env("INTERVALKIT_DATA_DIR", dir)
        .env("INTERVALKIT_LOG", "off")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_json(dir: &Path, args: &[&str]) -> Value {
    let (stdout, stderr, code) = run_cli(dir, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

#[test]
fn test_config_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = run_json(dir.path(), &["config", "list"]);
    assert_eq!(config["debounce_ms"], 150);
    assert_eq!(config["poll_interval_ms"], 200);
    assert_eq!(config["signals"]["sound"], true);
}

#[test]
fn test_config_set_get() {
    let dir = tempfile::tempdir().unwrap();
    let (_, _, code) = run_cli(dir.path(), &["config", "set", "poll_interval_ms", "500"]);
    assert_eq!(code, 0);
    let (stdout, _, code) = run_cli(dir.path(), &["config", "get", "poll_interval_ms"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "500");

    let (_, stderr, code) = run_cli(dir.path(), &["config", "get", "no_such_key"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("unknown key"));
}

#[test]
fn test_timer_show_first_run_default() {
    let dir = tempfile::tempdir().unwrap();
    let state = run_json(dir.path(), &["timer", "countdown", "show"]);
    assert_eq!(state["key"], "intervalkit:countdown");
    assert_eq!(state["record"]["kind"], "countdown");
    assert_eq!(state["record"]["running"], false);
    assert_eq!(state["record"]["signal"]["sound"], true);
    assert_eq!(state["clocks"][0]["formatted"], "05:00");
}

#[test]
fn test_timer_start_then_pause() {
    let dir = tempfile::tempdir().unwrap();
    run_json(dir.path(), &["timer", "countdown", "set-duration", "60000"]);
    let started = run_json(dir.path(), &["timer", "countdown", "start"]);
    assert_eq!(started["events"][0]["type"], "TimerStarted");
    assert_eq!(started["state"]["record"]["running"], true);

    let paused = run_json(dir.path(), &["timer", "countdown", "pause"]);
    assert_eq!(paused["events"][0]["type"], "TimerPaused");
    assert_eq!(paused["state"]["record"]["running"], false);
    assert!(paused["state"]["record"]["endAt"].is_null());

    let again = run_json(dir.path(), &["timer", "countdown", "pause"]);
    assert_eq!(again["events"], serde_json::json!([]));
}

#[test]
fn test_negative_adjust() {
    let dir = tempfile::tempdir().unwrap();
    let adjusted = run_json(dir.path(), &["timer", "analog", "adjust", "-60000"]);
    assert_eq!(adjusted["state"]["record"]["remainingMs"], 840_000);
}

#[test]
fn test_multi_sub_timer() {
    let dir = tempfile::tempdir().unwrap();
    run_json(dir.path(), &["timer", "multi", "add-sub", "tea", "Tea", "180000"]);
    run_json(dir.path(), &["timer", "multi", "add-sub", "eggs", "Eggs", "420000"]);
    run_json(dir.path(), &["timer", "multi", "start", "--sub", "tea"]);

    let (stdout, _, code) = run_cli(dir.path(), &["timer", "multi", "export"]);
    assert_eq!(code, 0);
    let record: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(record["version"], 2);
    assert_eq!(record["timers"]["tea"]["running"], true);
    assert_eq!(record["timers"]["eggs"]["running"], false);
}

#[test]
fn test_import_partial_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let record = run_json(
        dir.path(),
        &["timer", "cycle", "import", r#"{"intervalMs": 30000}"#],
    );
    assert_eq!(record["intervalMs"], 30_000);
    assert_eq!(record["cycles"], 0);
    assert_eq!(record["signal"]["sound"], false);
}

#[test]
fn test_expired_record_shows_completed() {
    let dir = tempfile::tempdir().unwrap();
    run_json(
        dir.path(),
        &[
            "timer",
            "countdown",
            "import",
            r#"{"durationMs": 60000, "remainingMs": 60000, "running": true, "endAt": 1000}"#,
        ],
    );
    let state = run_json(dir.path(), &["timer", "countdown", "show"]);
    assert_eq!(state["record"]["running"], false);
    assert_eq!(state["record"]["remainingMs"], 0);
    assert_eq!(state["clocks"][0]["formatted"], "00:00");

    let stats = run_json(dir.path(), &["stats", "all"]);
    assert_eq!(stats[0]["kind"], "countdown");
    assert_eq!(stats[0]["completions"], 1);
}

#[test]
fn test_pin_and_board() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(
        dir.path(),
        &["pin", "add", "intervalkit:stopwatch", "stopwatch", "Run"],
    );
    assert_eq!(code, 0);
    assert!(stdout.contains("pinned intervalkit:stopwatch"));

    let (_, _, code) = run_cli(
        dir.path(),
        &["pin", "add", "intervalkit:stopwatch", "stopwatch", "Twice"],
    );
    assert_ne!(code, 0);

    let started = run_json(dir.path(), &["board", "start", "intervalkit:stopwatch"]);
    assert_eq!(started["changed"], true);
    assert_eq!(started["pin"]["display"]["running"], true);

    let views = run_json(dir.path(), &["board", "show"]);
    assert_eq!(views[0]["handle"]["displayName"], "Run");

    let (_, _, code) = run_cli(dir.path(), &["pin", "remove", "intervalkit:stopwatch"]);
    assert_eq!(code, 0);
    let pins = run_json(dir.path(), &["pin", "list"]);
    assert_eq!(pins, serde_json::json!([]));
}

#[test]
fn test_watch_paused_timer_prints_once() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(dir.path(), &["watch", "countdown"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "05:00");
}

#[test]
fn test_unknown_kind_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (_, _, code) = run_cli(dir.path(), &["timer", "kitchen", "show"]);
    assert_ne!(code, 0);
}
