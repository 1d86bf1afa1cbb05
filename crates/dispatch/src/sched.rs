// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-car stop sequencing.
//!
//! Each registered car has one [`StopQueue`] of floors to visit. The queue
//! implements elevator-style SCAN ordering: at any time it is a committed
//! prefix of already-announced stops followed by at most two direction
//! blocks: upward stops sorted ascending and downward stops sorted
//! descending (in either block order). A pickup "on the way" therefore
//! merges into the current sweep instead of appending a fresh trip.

use std::collections::VecDeque;

use liftcore::floor::Floor;

/// Travel direction of a requested ride.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Direction of a ride from `source` to `destination`.
    pub fn of(source: Floor, destination: Floor) -> Direction {
        if destination > source {
            Direction::Up
        } else {
            Direction::Down
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    floor: Floor,
    direction: Direction,
    displayed: bool,
}

/// Ordered sequence of floors a car has been asked to visit.
#[derive(Debug, Default)]
pub struct StopQueue {
    entries: VecDeque<Entry>,
    last_displayed: Option<Floor>,
}

impl StopQueue {
    pub fn new() -> StopQueue {
        StopQueue::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the head stop has been announced to the car and the car has
    /// not yet arrived there.
    pub fn awaiting_arrival(&self) -> bool {
        self.entries.front().is_some_and(|e| e.displayed)
    }

    /// Queue both legs of a ride. The direction of each inserted floor is
    /// the direction of the ride, not of the car.
    pub fn insert_pair(&mut self, source: Floor, destination: Floor) {
        let direction = Direction::of(source, destination);
        self.ordered_insert(source, direction);
        self.ordered_insert(destination, direction);
    }

    /// Insert one floor, keeping the direction-band structure.
    ///
    /// A pending (undisplayed) duplicate of the same floor and direction
    /// makes this a no-op. Stops already announced to the car are never
    /// displaced: insertion starts after the displayed prefix. Within the
    /// matching direction block the floor lands at its sorted position;
    /// a floor sorting past the block's end lands at the block boundary
    /// rather than inside the opposite block.
    fn ordered_insert(&mut self, floor: Floor, direction: Direction) {
        let duplicate = self
            .entries
            .iter()
            .any(|e| !e.displayed && e.floor == floor && e.direction == direction);
        if duplicate {
            return;
        }

        let mut index = 0;
        while index < self.entries.len() && self.entries[index].displayed {
            index += 1;
        }
        // An opposite-direction block at the front is served first; the new
        // stop belongs to the sweep after it.
        while index < self.entries.len() && self.entries[index].direction != direction {
            index += 1;
        }
        while index < self.entries.len()
            && self.entries[index].direction == direction
            && precedes(self.entries[index].floor, floor, direction)
        {
            index += 1;
        }

        self.entries.insert(index, Entry { floor, direction, displayed: false });
    }

    /// Discard the head stop.
    pub fn pop_head(&mut self) {
        self.entries.pop_front();
    }

    /// Mark the first unannounced stop as displayed and return its floor.
    pub fn next_undisplayed(&mut self) -> Option<Floor> {
        let entry = self.entries.iter_mut().find(|e| !e.displayed)?;
        entry.displayed = true;
        self.last_displayed = Some(entry.floor);
        Some(entry.floor)
    }

    /// The floor most recently returned by [`next_undisplayed`], without
    /// mutating anything.
    ///
    /// [`next_undisplayed`]: StopQueue::next_undisplayed
    pub fn prev_displayed(&self) -> Option<Floor> {
        self.last_displayed
    }

    /// Floors in queue order, for diagnostics and tests.
    pub fn floors(&self) -> Vec<Floor> {
        self.entries.iter().map(|e| e.floor).collect()
    }
}

fn precedes(a: Floor, b: Floor, direction: Direction) -> bool {
    match direction {
        Direction::Up => a < b,
        Direction::Down => a > b,
    }
}

#[cfg(test)]
#[path = "sched_tests.rs"]
mod tests;
