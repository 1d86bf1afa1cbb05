// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Door cycling.
//!
//! The door worker reacts to the open/close buttons in the shared block.
//! Buttons are edge-triggered: the worker clears the flag before acting, so
//! a press during a cycle re-arms the cycle rather than being lost. While
//! the car is between floors the worker ignores wakes entirely.

use std::time::Duration;

use liftcore::shm::SharedBlock;
use liftcore::state::Status;
use tokio_util::sync::CancellationToken;

use super::{dwell, DwellEnd};

pub(crate) fn run(block: &SharedBlock, delay: Duration, stop: &CancellationToken) {
    loop {
        let mut guard = block.lock();
        if stop.is_cancelled() {
            break;
        }
        if guard.status() == Some(Status::Between) {
            guard.wait();
            continue;
        }
        if guard.open_button() {
            guard.set_open_button(false);
            guard.broadcast();
            drop(guard);
            button_cycle(block, delay, stop);
            continue;
        }
        if guard.close_button() {
            guard.set_close_button(false);
            guard.broadcast();
            let needs_closing = guard.status() != Some(Status::Closed);
            drop(guard);
            if needs_closing {
                close_cycle(block, delay, stop);
            }
            continue;
        }
        guard.wait();
    }
}

/// Full open cycle for a button press. The open dwell is interruptible by
/// either button; in individual service mode the doors stay open until the
/// operator closes them.
fn button_cycle(block: &SharedBlock, delay: Duration, stop: &CancellationToken) {
    block.set_status(Status::Opening);
    if dwell(block, delay, stop, false) == DwellEnd::Stopped {
        return;
    }
    block.set_status(Status::Open);
    match dwell(block, delay, stop, true) {
        DwellEnd::Elapsed => {}
        // A pressed button is handled afresh by the worker loop.
        DwellEnd::Button | DwellEnd::Stopped => return,
    }
    if block.lock().service_mode() {
        return;
    }
    block.set_status(Status::Closing);
    if dwell(block, delay, stop, false) == DwellEnd::Stopped {
        return;
    }
    block.set_status(Status::Closed);
}

/// Close from wherever the doors are.
fn close_cycle(block: &SharedBlock, delay: Duration, stop: &CancellationToken) {
    block.set_status(Status::Closing);
    if dwell(block, delay, stop, false) == DwellEnd::Stopped {
        return;
    }
    block.set_status(Status::Closed);
}

/// One full uninterrupted cycle, run by the level worker on arrival.
pub(crate) fn arrival_cycle(block: &SharedBlock, delay: Duration, stop: &CancellationToken) {
    for status in [Status::Opening, Status::Open, Status::Closing] {
        block.set_status(status);
        if dwell(block, delay, stop, false) == DwellEnd::Stopped {
            return;
        }
    }
    block.set_status(Status::Closed);
}

#[cfg(test)]
#[path = "doors_tests.rs"]
mod tests;
