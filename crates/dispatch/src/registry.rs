// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The controller's table of connected cars.
//!
//! Registrations keep their arrival order; call dispatch scans in that
//! order and takes the first eligible car. Withdrawal compacts the table so
//! active entries always occupy a prefix. Entries are addressed by an opaque
//! token because compaction invalidates positions.

use liftcore::floor::{Floor, FloorRange};
use tokio::net::tcp::OwnedWriteHalf;

use crate::sched::StopQueue;

/// Default number of car slots, matching the listen backlog.
pub const DEFAULT_CAR_SLOTS: usize = 10;

/// One connected car.
#[derive(Debug)]
pub struct CarReg {
    pub token: u64,
    pub name: String,
    pub range: FloorRange,
    pub writer: OwnedWriteHalf,
    pub queue: StopQueue,
}

/// Bounded, arrival-ordered registry of cars.
pub struct Registry {
    cars: Vec<CarReg>,
    capacity: usize,
}

impl Registry {
    pub fn new(capacity: usize) -> Registry {
        Registry { cars: Vec::with_capacity(capacity), capacity }
    }

    pub fn len(&self) -> usize {
        self.cars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cars.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.cars.len() >= self.capacity
    }

    /// Admit a car. Returns the registration back if every slot is taken.
    pub fn admit(&mut self, reg: CarReg) -> Result<(), CarReg> {
        if self.is_full() {
            return Err(reg);
        }
        self.cars.push(reg);
        Ok(())
    }

    /// Withdraw a car, keeping the remaining entries in arrival order.
    pub fn withdraw(&mut self, token: u64) -> Option<CarReg> {
        let index = self.cars.iter().position(|c| c.token == token)?;
        Some(self.cars.remove(index))
    }

    pub fn get_mut(&mut self, token: u64) -> Option<&mut CarReg> {
        self.cars.iter_mut().find(|c| c.token == token)
    }

    /// First car, in registration order, whose range covers both legs.
    pub fn first_covering(&mut self, source: Floor, destination: Floor) -> Option<&mut CarReg> {
        self.cars
            .iter_mut()
            .find(|c| c.range.contains(source) && c.range.contains(destination))
    }

    /// Registered car names in arrival order, for diagnostics.
    pub fn names(&self) -> Vec<&str> {
        self.cars.iter().map(|c| c.name.as_str()).collect()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
