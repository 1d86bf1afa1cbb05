// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Floor traversal.
//!
//! The level worker moves the car one floor per delay toward the shared
//! destination, re-reading the destination at every step so a retarget
//! mid-flight takes effect immediately. It moves only with the doors closed
//! and never while emergency mode is latched; destinations outside the
//! car's physical span are snapped to the nearest limit.

use std::time::Duration;

use liftcore::floor::FloorRange;
use liftcore::shm::SharedBlock;
use liftcore::state::Status;
use tokio_util::sync::CancellationToken;

use super::{doors, dwell, DwellEnd};

pub(crate) fn run(
    block: &SharedBlock,
    range: FloorRange,
    delay: Duration,
    stop: &CancellationToken,
) {
    loop {
        let mut guard = block.lock();
        if stop.is_cancelled() {
            break;
        }
        let decoded = (guard.status(), guard.current(), guard.destination());
        let (Some(status), Some(current), Some(destination)) = decoded else {
            guard.wait();
            continue;
        };
        if current == destination {
            guard.wait();
            continue;
        }
        if destination < range.lowest() {
            guard.set_destination(range.lowest());
            guard.set_status(Status::Closed);
            guard.broadcast();
            continue;
        }
        if destination > range.highest() {
            guard.set_destination(range.highest());
            guard.set_status(Status::Closed);
            guard.broadcast();
            continue;
        }
        if status != Status::Closed || guard.emergency_mode() {
            guard.wait();
            continue;
        }
        guard.set_status(Status::Between);
        guard.broadcast();
        drop(guard);

        let arrived = travel(block, delay, stop);
        if arrived && !block.lock().service_mode() {
            doors::arrival_cycle(block, delay, stop);
        }
    }
}

/// Step floor by floor until the (possibly moving) destination is reached.
/// Returns whether the car arrived rather than being shut down.
fn travel(block: &SharedBlock, delay: Duration, stop: &CancellationToken) -> bool {
    loop {
        if dwell(block, delay, stop, false) == DwellEnd::Stopped {
            return false;
        }
        let mut guard = block.lock();
        if stop.is_cancelled() {
            return false;
        }
        let (Some(current), Some(destination)) = (guard.current(), guard.destination()) else {
            guard.set_status(Status::Closed);
            guard.broadcast();
            return false;
        };
        if current == destination {
            // Retargeted to where we already are.
            guard.set_status(Status::Closed);
            guard.broadcast();
            return true;
        }
        let next = if destination > current {
            current.up()
        } else {
            current.down()
        };
        let Some(next) = next else {
            guard.set_status(Status::Closed);
            guard.broadcast();
            return false;
        };
        guard.set_current(next);
        if next == destination {
            guard.set_status(Status::Closed);
            guard.broadcast();
            return true;
        }
        guard.broadcast();
    }
}

#[cfg(test)]
#[path = "level_tests.rs"]
mod tests;
