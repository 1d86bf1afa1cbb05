// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The safety monitor.
//!
//! An independent process watching one car's shared block. It never trusts
//! the other writers: every tick re-validates the block, reverses closing
//! doors on an obstruction, and latches emergency mode on the stop button,
//! the overload sensor, or any data-consistency violation. Output inside
//! the loop goes through the raw `write(2)` syscall only, with no buffered
//! I/O between a detected hazard and the operator's console.

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use liftcore::shm::SharedBlock;
use liftcore::state::{RawState, Status};
use tokio_util::sync::CancellationToken;

/// Arguments for running a safety monitor.
#[derive(Debug, Clone, Args)]
pub struct SafetyArgs {
    /// Name of the car to watch.
    pub name: String,
}

/// Run the monitor until SIGINT/SIGTERM.
pub async fn run(args: &SafetyArgs) -> i32 {
    let Ok(block) = SharedBlock::attach(&args.name) else {
        println!("Unable to access car {}.", args.name);
        return 1;
    };
    let block = Arc::new(block);
    let stop = CancellationToken::new();

    tokio::spawn({
        let stop = stop.clone();
        let block = Arc::clone(&block);
        async move {
            let _ = tokio::signal::ctrl_c().await;
            stop.cancel();
            block.notify_all();
            let _ = tokio::signal::ctrl_c().await;
            std::process::exit(130);
        }
    });

    let monitor = tokio::task::spawn_blocking(move || monitor_loop(&block, &stop));
    let _ = monitor.await;
    0
}

/// One-shot message latches.
///
/// Button and overload reports fire at most once per monitor lifetime; the
/// data-consistency report fires once per violation episode, re-arming when
/// the block becomes valid again.
#[derive(Debug, Default)]
pub struct Latches {
    stop_reported: bool,
    overload_reported: bool,
    data_error_reported: bool,
}

/// What one tick of the monitor decided.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Verdict {
    pub lines: Vec<&'static str>,
    pub reopen: bool,
    pub latch_emergency: bool,
}

/// Judge one snapshot of the block.
pub fn evaluate(raw: &RawState, latches: &mut Latches) -> Verdict {
    let mut verdict = Verdict::default();

    if raw.validate().is_err() {
        if !latches.data_error_reported {
            verdict.lines.push("Data consistency error!\n");
            latches.data_error_reported = true;
        }
        verdict.latch_emergency = true;
    } else {
        latches.data_error_reported = false;
    }

    if raw.decode_status() == Some(Status::Closing) && raw.door_obstruction == 1 {
        verdict.reopen = true;
    }

    if raw.emergency_stop == 1 {
        if !latches.stop_reported {
            verdict.lines.push("The emergency stop button has been pressed!\n");
            latches.stop_reported = true;
        }
        verdict.latch_emergency = true;
    }

    if raw.overload == 1 {
        if !latches.overload_reported {
            verdict.lines.push("The overload sensor has been tripped!\n");
            latches.overload_reported = true;
        }
        verdict.latch_emergency = true;
    }

    verdict
}

/// The monitor loop: timed condvar wait, judge, act, broadcast.
pub fn monitor_loop(block: &SharedBlock, stop: &CancellationToken) {
    let mut latches = Latches::default();
    loop {
        let mut guard = block.lock();
        if stop.is_cancelled() {
            break;
        }
        guard.wait_timeout(Duration::from_secs(1));
        if stop.is_cancelled() {
            break;
        }

        let verdict = evaluate(&guard.raw(), &mut latches);
        for line in &verdict.lines {
            emit(line);
        }
        if verdict.reopen {
            guard.set_status(Status::Opening);
        }
        if verdict.latch_emergency {
            guard.set_emergency_mode(true);
        }
        guard.broadcast();
    }
}

fn emit(line: &str) {
    let _ = nix::unistd::write(std::io::stdout(), line.as_bytes());
}

#[cfg(test)]
#[path = "safety_tests.rs"]
mod tests;
