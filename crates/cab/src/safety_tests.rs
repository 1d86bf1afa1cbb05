// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use liftcore::floor::Floor;

use super::*;

static COUNTER: AtomicU32 = AtomicU32::new(0);

fn unique_name() -> String {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("ST{}{}", std::process::id(), n)
}

fn healthy() -> RawState {
    RawState {
        current_floor: Floor::GROUND.to_padded(),
        destination_floor: Floor::GROUND.to_padded(),
        status: Status::Closed.to_padded(),
        open_button: 0,
        close_button: 0,
        door_obstruction: 0,
        overload: 0,
        emergency_stop: 0,
        individual_service_mode: 0,
        emergency_mode: 0,
    }
}

#[test]
fn healthy_block_produces_no_verdict() {
    let mut latches = Latches::default();
    let verdict = evaluate(&healthy(), &mut latches);
    assert_eq!(verdict, Verdict::default());
}

#[test]
fn corrupt_status_reports_once_per_episode() {
    let mut latches = Latches::default();
    let mut raw = healthy();
    raw.status = *b"Asdfghj\0";

    let first = evaluate(&raw, &mut latches);
    assert_eq!(first.lines, ["Data consistency error!\n"]);
    assert!(first.latch_emergency);

    // Still corrupt: keep forcing emergency, stop repeating the line.
    let second = evaluate(&raw, &mut latches);
    assert!(second.lines.is_empty());
    assert!(second.latch_emergency);

    // Recovered, then corrupted again: a fresh report fires.
    evaluate(&healthy(), &mut latches);
    let third = evaluate(&raw, &mut latches);
    assert_eq!(third.lines, ["Data consistency error!\n"]);
}

#[test]
fn obstruction_during_closing_reopens_without_emergency() {
    let mut latches = Latches::default();
    let mut raw = healthy();
    raw.status = Status::Closing.to_padded();
    raw.door_obstruction = 1;

    let verdict = evaluate(&raw, &mut latches);
    assert!(verdict.reopen);
    assert!(!verdict.latch_emergency);
    assert!(verdict.lines.is_empty());
}

#[test]
fn obstruction_while_parked_is_a_consistency_error() {
    let mut latches = Latches::default();
    let mut raw = healthy();
    raw.door_obstruction = 1;

    let verdict = evaluate(&raw, &mut latches);
    assert!(!verdict.reopen);
    assert!(verdict.latch_emergency);
    assert_eq!(verdict.lines, ["Data consistency error!\n"]);
}

#[test]
fn emergency_stop_reports_once_for_the_monitor_lifetime() {
    let mut latches = Latches::default();
    let mut raw = healthy();
    raw.emergency_stop = 1;

    let first = evaluate(&raw, &mut latches);
    assert_eq!(first.lines, ["The emergency stop button has been pressed!\n"]);
    assert!(first.latch_emergency);

    let second = evaluate(&raw, &mut latches);
    assert!(second.lines.is_empty());
    assert!(second.latch_emergency);

    // Releasing and re-pressing does not re-report.
    raw.emergency_stop = 0;
    evaluate(&raw, &mut latches);
    raw.emergency_stop = 1;
    assert!(evaluate(&raw, &mut latches).lines.is_empty());
}

#[test]
fn overload_reports_once_and_latches() {
    let mut latches = Latches::default();
    let mut raw = healthy();
    raw.overload = 1;

    let first = evaluate(&raw, &mut latches);
    assert_eq!(first.lines, ["The overload sensor has been tripped!\n"]);
    assert!(first.latch_emergency);
    assert!(evaluate(&raw, &mut latches).lines.is_empty());
}

#[test]
fn both_sensors_report_in_rule_order() {
    let mut latches = Latches::default();
    let mut raw = healthy();
    raw.emergency_stop = 1;
    raw.overload = 1;

    let verdict = evaluate(&raw, &mut latches);
    assert_eq!(
        verdict.lines,
        [
            "The emergency stop button has been pressed!\n",
            "The overload sensor has been tripped!\n",
        ]
    );
}

/// Drive the real loop against a real block.
struct Rig {
    block: Arc<SharedBlock>,
    stop: CancellationToken,
    monitor: Option<std::thread::JoinHandle<()>>,
}

impl Rig {
    fn new() -> Rig {
        let block = Arc::new(SharedBlock::create(&unique_name()).unwrap());
        let stop = CancellationToken::new();
        let monitor = std::thread::spawn({
            let block = Arc::clone(&block);
            let stop = stop.clone();
            move || monitor_loop(&block, &stop)
        });
        Rig { block, stop, monitor: Some(monitor) }
    }

    fn wait_until(&self, timeout: Duration, pred: impl Fn(&RawState) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if pred(&self.block.raw()) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }
}

impl Drop for Rig {
    fn drop(&mut self) {
        self.stop.cancel();
        self.block.notify_all();
        if let Some(monitor) = self.monitor.take() {
            let _ = monitor.join();
        }
    }
}

const TICK: Duration = Duration::from_secs(2);

#[test]
fn live_monitor_reverses_obstructed_closing_doors() {
    let rig = Rig::new();
    {
        let mut guard = rig.block.lock();
        guard.set_status(Status::Closing);
        guard.set_door_obstruction(true);
        guard.broadcast();
    }
    assert!(rig.wait_until(TICK, |raw| raw.decode_status() == Some(Status::Opening)));
    assert_eq!(rig.block.raw().emergency_mode, 0);
}

#[test]
fn live_monitor_latches_emergency_on_corruption() {
    let rig = Rig::new();
    {
        let mut guard = rig.block.lock();
        guard.set_status_label("Asdfghj");
        guard.broadcast();
    }
    assert!(rig.wait_until(TICK, |raw| raw.emergency_mode == 1));
}

#[test]
fn live_monitor_latches_emergency_on_stop_button() {
    let rig = Rig::new();
    rig.block.set_emergency_stop(true);
    assert!(rig.wait_until(TICK, |raw| raw.emergency_mode == 1));
}
