// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed view of the car state published in shared memory.
//!
//! The block stores its fields exactly as the operator tooling expects them
//! on the wire: NUL-padded ASCII for the status and floor labels, single
//! bytes for the flags. Decoding is defensive throughout: a block written
//! by a faulty peer may hold arbitrary bytes, and it is the safety monitor's
//! job to notice, not any reader's job to assume.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::floor::Floor;

/// Door and motion phase of a car.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Closed,
    Opening,
    Open,
    Closing,
    Between,
}

/// Error produced when text does not name a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("not a recognised status")]
pub struct StatusParseError;

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Closed => "Closed",
            Status::Opening => "Opening",
            Status::Open => "Open",
            Status::Closing => "Closing",
            Status::Between => "Between",
        }
    }

    /// Render into the NUL-padded field stored in the shared block.
    pub fn to_padded(self) -> [u8; 8] {
        let mut out = [0u8; 8];
        let text = self.as_str();
        out[..text.len()].copy_from_slice(text.as_bytes());
        out
    }

    /// Parse the NUL-padded field stored in the shared block.
    pub fn from_padded(raw: &[u8; 8]) -> Option<Status> {
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        let text = std::str::from_utf8(&raw[..end]).ok()?;
        text.parse().ok()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Closed" => Ok(Status::Closed),
            "Opening" => Ok(Status::Opening),
            "Open" => Ok(Status::Open),
            "Closing" => Ok(Status::Closing),
            "Between" => Ok(Status::Between),
            _ => Err(StatusParseError),
        }
    }
}

/// Byte-for-byte copy of the payload fields of a car's shared block.
///
/// Field order matches the block layout; flags hold whatever byte is in the
/// block, which is how out-of-range values become observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawState {
    pub current_floor: [u8; 4],
    pub destination_floor: [u8; 4],
    pub status: [u8; 8],
    pub open_button: u8,
    pub close_button: u8,
    pub door_obstruction: u8,
    pub overload: u8,
    pub emergency_stop: u8,
    pub individual_service_mode: u8,
    pub emergency_mode: u8,
}

/// A way in which a shared block fails its validity invariants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConsistencyError {
    #[error("flag field holds a value other than 0 or 1")]
    FlagRange,
    #[error("status field is unrecognised")]
    Status,
    #[error("floor field is not a legal floor label")]
    Floor,
    #[error("door obstruction flagged while doors are not moving")]
    Obstruction,
}

impl RawState {
    pub fn decode_status(&self) -> Option<Status> {
        Status::from_padded(&self.status)
    }

    pub fn decode_current(&self) -> Option<Floor> {
        Floor::from_padded(&self.current_floor)
    }

    pub fn decode_destination(&self) -> Option<Floor> {
        Floor::from_padded(&self.destination_floor)
    }

    /// Check the block invariants: binary flags, recognised status, legal
    /// floor labels, and obstruction only while the doors are in motion.
    pub fn validate(&self) -> Result<(), ConsistencyError> {
        let flags = [
            self.open_button,
            self.close_button,
            self.door_obstruction,
            self.overload,
            self.emergency_stop,
            self.individual_service_mode,
            self.emergency_mode,
        ];
        if flags.iter().any(|&f| f > 1) {
            return Err(ConsistencyError::FlagRange);
        }
        let status = self.decode_status().ok_or(ConsistencyError::Status)?;
        if self.decode_current().is_none() || self.decode_destination().is_none() {
            return Err(ConsistencyError::Floor);
        }
        if self.door_obstruction == 1 && !matches!(status, Status::Opening | Status::Closing) {
            return Err(ConsistencyError::Obstruction);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
