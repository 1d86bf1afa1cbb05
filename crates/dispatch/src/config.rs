// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

use crate::registry::DEFAULT_CAR_SLOTS;

/// Central lift dispatcher.
#[derive(Debug, Clone, Parser)]
#[command(name = "liftd", version, about)]
pub struct DispatchConfig {
    /// Address to listen on for cars and call pads.
    #[arg(long, env = "LIFTD_LISTEN", default_value = "127.0.0.1:3000")]
    pub listen: String,

    /// Maximum number of simultaneously registered cars.
    #[arg(long, env = "LIFTD_CAR_SLOTS", default_value_t = DEFAULT_CAR_SLOTS)]
    pub car_slots: usize,
}
