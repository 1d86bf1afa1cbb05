// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The car agent.
//!
//! Four workers share the car's state block: the door worker and level
//! worker are OS threads blocking on the block's condition variable, a
//! watcher thread bridges condvar broadcasts onto an async channel, and the
//! liaison (with its receiver and updater) keeps the controller informed
//! over TCP. The door and level workers never observe controller state;
//! they act only on the block.

mod doors;
mod level;
mod liaison;

use std::sync::Arc;
use std::time::{Duration, Instant};

use liftcore::shm::SharedBlock;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::CarConfig;

/// Run a car agent until SIGINT/SIGTERM.
pub async fn run(config: CarConfig) -> anyhow::Result<()> {
    config.validate()?;
    let range = config.range()?;
    let delay = config.delay();

    let block = Arc::new(SharedBlock::create(&config.name)?);
    {
        // The car parks at the bottom of its shaft, not necessarily at `1`.
        let mut guard = block.lock();
        guard.set_current(config.lowest);
        guard.set_destination(config.lowest);
        guard.broadcast();
    }

    let stop = CancellationToken::new();
    // The handler must not keep the block alive past teardown, or the
    // owner's unlink never runs.
    spawn_signal_handler(stop.clone(), Arc::downgrade(&block));

    let doors = std::thread::Builder::new().name("doors".to_owned()).spawn({
        let block = Arc::clone(&block);
        let stop = stop.clone();
        move || doors::run(&block, delay, &stop)
    })?;
    let level = std::thread::Builder::new().name("level".to_owned()).spawn({
        let block = Arc::clone(&block);
        let stop = stop.clone();
        move || level::run(&block, range, delay, &stop)
    })?;
    let (updates, watcher) = liaison::spawn_watcher(Arc::clone(&block), stop.clone())?;

    info!(car = %config.name, lowest = %config.lowest, highest = %config.highest, "car agent running");
    liaison::run(&block, &config, updates, stop.clone()).await;

    stop.cancel();
    block.notify_all();
    let _ = doors.join();
    let _ = level.join();
    let _ = watcher.join();
    // Dropping the owning block unlinks `/car<NAME>`.
    Ok(())
}

/// How a timed, lock-holding pause ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DwellEnd {
    Elapsed,
    Button,
    Stopped,
}

/// Hold one door/movement delay, waking early on shutdown and, when
/// `buttons_interrupt` is set, on a button press.
pub(crate) fn dwell(
    block: &SharedBlock,
    delay: Duration,
    stop: &CancellationToken,
    buttons_interrupt: bool,
) -> DwellEnd {
    let deadline = Instant::now() + delay;
    let mut guard = block.lock();
    loop {
        if stop.is_cancelled() {
            return DwellEnd::Stopped;
        }
        if buttons_interrupt && (guard.open_button() || guard.close_button()) {
            return DwellEnd::Button;
        }
        let now = Instant::now();
        if now >= deadline {
            return DwellEnd::Elapsed;
        }
        guard.wait_timeout(deadline - now);
    }
}

/// First signal cancels the stop token (and wakes the condvar loops so they
/// see it); a second signal forces the process out.
fn spawn_signal_handler(stop: CancellationToken, block: std::sync::Weak<SharedBlock>) {
    tokio::spawn(async move {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        let mut sigint =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

        tokio::select! {
            _ = async {
                if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
            } => {
                info!("received SIGTERM");
            }
            _ = async {
                if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
            } => {
                info!("received SIGINT");
            }
        }
        stop.cancel();
        if let Some(block) = block.upgrade() {
            block.notify_all();
        }

        tokio::select! {
            _ = async {
                if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
            } => {}
            _ = async {
                if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
            } => {}
        }
        std::process::exit(130);
    });
}
