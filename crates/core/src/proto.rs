// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The control-channel vocabulary.
//!
//! Frames are free-form ASCII split on single spaces. Call pads open a
//! transient connection, send `CALL`, and read one reply; cars hold a
//! persistent connection on which they announce themselves with `CAR`,
//! stream `STATUS` updates, and receive `FLOOR` stops until they withdraw
//! with `EMERGENCY` or `INDIVIDUAL SERVICE`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::floor::Floor;
use crate::state::Status;

/// One control-channel message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Call pad → controller: request a ride from `source` to `destination`.
    Call { source: Floor, destination: Floor },
    /// Controller → call pad: the named car will serve the ride.
    Car { name: String },
    /// Controller → call pad: no registered car covers the ride.
    Unavailable,
    /// Car → controller: registration with the car's serviceable span.
    Register { name: String, lowest: Floor, highest: Floor },
    /// Car → controller: current phase, position, and target.
    Status { status: Status, current: Floor, destination: Floor },
    /// Car → controller: emergency latched; the car is withdrawing.
    Emergency,
    /// Car → controller: individual service mode; the car is withdrawing.
    IndividualService,
    /// Controller → car: visit this floor.
    Floor { floor: Floor },
}

/// Error produced for frames that are not part of the vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unrecognised control message")]
pub struct ProtoError;

impl Message {
    /// Render the single-space ASCII payload for this message.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Parse a frame payload. Frames outside the vocabulary (unknown verbs,
    /// wrong arities, illegal floors) are all [`ProtoError`]; callers drop
    /// them and keep the connection.
    pub fn parse(payload: &str) -> Result<Message, ProtoError> {
        payload.parse()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Call { source, destination } => write!(f, "CALL {source} {destination}"),
            Message::Car { name } => write!(f, "CAR {name}"),
            Message::Unavailable => f.write_str("UNAVAILABLE"),
            Message::Register { name, lowest, highest } => {
                write!(f, "CAR {name} {lowest} {highest}")
            }
            Message::Status { status, current, destination } => {
                write!(f, "STATUS {status} {current} {destination}")
            }
            Message::Emergency => f.write_str("EMERGENCY"),
            Message::IndividualService => f.write_str("INDIVIDUAL SERVICE"),
            Message::Floor { floor } => write!(f, "FLOOR {floor}"),
        }
    }
}

impl FromStr for Message {
    type Err = ProtoError;

    fn from_str(payload: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = payload.split(' ').collect();
        match fields.as_slice() {
            ["CALL", source, destination] => Ok(Message::Call {
                source: parse_floor(source)?,
                destination: parse_floor(destination)?,
            }),
            ["CAR", name] if !name.is_empty() => Ok(Message::Car { name: (*name).to_owned() }),
            ["CAR", name, lowest, highest] if !name.is_empty() => Ok(Message::Register {
                name: (*name).to_owned(),
                lowest: parse_floor(lowest)?,
                highest: parse_floor(highest)?,
            }),
            ["UNAVAILABLE"] => Ok(Message::Unavailable),
            ["STATUS", status, current, destination] => Ok(Message::Status {
                status: status.parse().map_err(|_| ProtoError)?,
                current: parse_floor(current)?,
                destination: parse_floor(destination)?,
            }),
            ["EMERGENCY"] => Ok(Message::Emergency),
            ["INDIVIDUAL", "SERVICE"] => Ok(Message::IndividualService),
            ["FLOOR", floor] => Ok(Message::Floor { floor: parse_floor(floor)? }),
            _ => Err(ProtoError),
        }
    }
}

fn parse_floor(field: &str) -> Result<Floor, ProtoError> {
    field.parse().map_err(|_| ProtoError)
}

#[cfg(test)]
#[path = "proto_tests.rs"]
mod tests;
