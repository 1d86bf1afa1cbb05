// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The in-car service panel.
//!
//! Writes one operation into a running car's shared block and exits. The
//! button operations work in any mode; manual movement (`up`/`down`)
//! requires individual service mode with the car stationary and closed.

use std::str::FromStr;

use clap::Args;
use liftcore::shm::SharedBlock;
use liftcore::state::Status;
use thiserror::Error;

/// Arguments for a service-panel operation.
#[derive(Debug, Clone, Args)]
pub struct InternalArgs {
    /// Name of the car to operate on.
    pub name: String,

    /// One of: open, close, stop, service_on, service_off, up, down.
    pub operation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Open,
    Close,
    Stop,
    ServiceOn,
    ServiceOff,
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid operation.")]
pub struct OpParseError;

impl FromStr for Op {
    type Err = OpParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Op::Open),
            "close" => Ok(Op::Close),
            "stop" => Ok(Op::Stop),
            "service_on" => Ok(Op::ServiceOn),
            "service_off" => Ok(Op::ServiceOff),
            "up" => Ok(Op::Up),
            "down" => Ok(Op::Down),
            _ => Err(OpParseError),
        }
    }
}

/// Why a movement operation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OpError {
    #[error("Operation only allowed in service mode.")]
    NotInServiceMode,
    #[error("Operation not allowed while elevator is moving.")]
    Moving,
    #[error("Operation not allowed while doors are open.")]
    DoorsOpen,
}

/// Run the panel: attach, apply, report. Prints nothing on success.
pub fn run(args: &InternalArgs) -> i32 {
    let Ok(op) = args.operation.parse::<Op>() else {
        println!("Invalid operation.");
        return 1;
    };
    let Ok(block) = SharedBlock::attach(&args.name) else {
        println!("Unable to access car {}.", args.name);
        return 1;
    };
    match apply(&block, op) {
        Ok(()) => 0,
        Err(e) => {
            println!("{e}");
            1
        }
    }
}

/// Apply one operation to an attached block.
pub fn apply(block: &SharedBlock, op: Op) -> Result<(), OpError> {
    match op {
        Op::Open => block.set_open_button(true),
        Op::Close => block.set_close_button(true),
        Op::Stop => block.set_emergency_stop(true),
        Op::ServiceOn => block.set_service_mode(true),
        Op::ServiceOff => block.set_service_mode(false),
        Op::Up => step_destination(block, true)?,
        Op::Down => step_destination(block, false)?,
    }
    Ok(())
}

/// Nudge the destination one floor. Stepping past the end of the floor
/// universe leaves the destination unchanged; the car's own level worker
/// clamps destinations to its physical range.
fn step_destination(block: &SharedBlock, upward: bool) -> Result<(), OpError> {
    let mut guard = block.lock();
    if !guard.service_mode() {
        return Err(OpError::NotInServiceMode);
    }
    match guard.status() {
        Some(Status::Between) => return Err(OpError::Moving),
        Some(Status::Closed) => {}
        _ => return Err(OpError::DoorsOpen),
    }
    let Some(destination) = guard.destination() else {
        return Err(OpError::Moving);
    };
    let stepped = if upward { destination.up() } else { destination.down() };
    if let Some(floor) = stepped {
        guard.set_destination(floor);
        guard.broadcast();
    }
    Ok(())
}

#[cfg(test)]
#[path = "internal_tests.rs"]
mod tests;
