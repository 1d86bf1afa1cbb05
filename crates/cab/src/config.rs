// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use clap::Args;
use liftcore::floor::{Floor, FloorRange};

/// Arguments for running a car agent.
#[derive(Debug, Clone, Args)]
pub struct CarConfig {
    /// Name of the car; also names its shared state block.
    pub name: String,

    /// Lowest floor this car serves.
    pub lowest: Floor,

    /// Highest floor this car serves.
    pub highest: Floor,

    /// Milliseconds between door transitions and per-floor movement steps.
    pub delay_ms: u64,

    /// Controller address.
    #[arg(long, env = "CAB_CONTROLLER", default_value = "127.0.0.1:3000")]
    pub controller: String,
}

impl CarConfig {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.name.is_empty() || !self.name.bytes().all(|b| b.is_ascii_alphanumeric()) {
            anyhow::bail!("car name must be non-empty and alphanumeric");
        }
        self.range()?;
        if self.delay_ms == 0 {
            anyhow::bail!("delay must be at least 1 ms");
        }
        Ok(())
    }

    /// The car's serviceable span.
    pub fn range(&self) -> anyhow::Result<FloorRange> {
        FloorRange::new(self.lowest, self.highest)
            .map_err(|_| anyhow::anyhow!("lowest floor is above highest floor"))
    }

    /// The door/movement cadence.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
