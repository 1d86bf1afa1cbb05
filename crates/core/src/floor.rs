// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Floor labels and arithmetic.
//!
//! Floors are short ASCII labels: basements `B99`..`B1`, then `1`..`999`.
//! There is no floor zero; `B1` sits directly below `1`. Internally a floor
//! is the ordinal `Bk -> 1-k`, `k -> k`, which makes comparison and stepping
//! plain integer operations.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Ordinal of the lowest legal floor, `B99`.
const MIN_ORDINAL: i16 = -98;
/// Ordinal of the highest legal floor, `999`.
const MAX_ORDINAL: i16 = 999;

/// A single floor of the building.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Floor(i16);

/// Error produced when text does not name a legal floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("not a legal floor label")]
pub struct FloorParseError;

impl Floor {
    /// The lowest floor any car can serve (`B99`).
    pub const LOWEST: Floor = Floor(MIN_ORDINAL);
    /// The highest floor any car can serve (`999`).
    pub const HIGHEST: Floor = Floor(MAX_ORDINAL);
    /// The ground floor, `1`. Every block starts here.
    pub const GROUND: Floor = Floor(1);

    /// The floor one step up, or `None` at the top of the universe.
    pub fn up(self) -> Option<Floor> {
        if self.0 >= MAX_ORDINAL {
            None
        } else {
            Some(Floor(self.0 + 1))
        }
    }

    /// The floor one step down, or `None` at the bottom of the universe.
    pub fn down(self) -> Option<Floor> {
        if self.0 <= MIN_ORDINAL {
            None
        } else {
            Some(Floor(self.0 - 1))
        }
    }

    /// Render into a NUL-padded fixed field as stored in the shared block.
    pub fn to_padded(self) -> [u8; 4] {
        let mut out = [0u8; 4];
        let label = self.to_string();
        out[..label.len()].copy_from_slice(label.as_bytes());
        out
    }

    /// Parse a NUL-padded fixed field as stored in the shared block.
    pub fn from_padded(raw: &[u8; 4]) -> Option<Floor> {
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        let text = std::str::from_utf8(&raw[..end]).ok()?;
        text.parse().ok()
    }
}

impl fmt::Display for Floor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 <= 0 {
            write!(f, "B{}", 1 - self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl fmt::Debug for Floor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Floor({self})")
    }
}

impl FromStr for Floor {
    type Err = FloorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (digits, basement) = match s.strip_prefix('B') {
            Some(rest) => (rest, true),
            None => (s, false),
        };
        if digits.is_empty()
            || digits.len() > 3
            || digits.starts_with('0')
            || !digits.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(FloorParseError);
        }
        let number: i16 = digits.parse().map_err(|_| FloorParseError)?;
        if basement {
            if number > 99 {
                return Err(FloorParseError);
            }
            Ok(Floor(1 - number))
        } else {
            Ok(Floor(number))
        }
    }
}

/// The span of floors a car physically serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloorRange {
    lowest: Floor,
    highest: Floor,
}

/// Error produced when a range's bounds are inverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("lowest floor is above highest floor")]
pub struct RangeError;

impl FloorRange {
    /// Build a range, rejecting inverted bounds.
    pub fn new(lowest: Floor, highest: Floor) -> Result<FloorRange, RangeError> {
        if lowest > highest {
            return Err(RangeError);
        }
        Ok(FloorRange { lowest, highest })
    }

    pub fn lowest(&self) -> Floor {
        self.lowest
    }

    pub fn highest(&self) -> Floor {
        self.highest
    }

    /// Whether the floor lies within the serviceable span.
    pub fn contains(&self, floor: Floor) -> bool {
        self.lowest <= floor && floor <= self.highest
    }
}

#[cfg(test)]
#[path = "floor_tests.rs"]
mod tests;
