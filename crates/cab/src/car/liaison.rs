// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The controller liaison.
//!
//! A watcher thread turns every condvar broadcast into a state snapshot on
//! an async channel. While the car is in normal mode the liaison keeps one
//! connection to the controller: a receiver task applies `FLOOR` commands
//! to the block, and the update stream relays snapshots as `STATUS` frames
//! until a terminal condition (`EMERGENCY`, `INDIVIDUAL SERVICE`) or a dead
//! socket ends the link. The liaison then reconnects once the car is back
//! in normal mode.

use std::sync::Arc;

use liftcore::frame;
use liftcore::proto::Message;
use liftcore::shm::SharedBlock;
use liftcore::state::RawState;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::CarConfig;

/// Why a controller link ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkEnd {
    /// Emergency latched; we told the controller and hung up.
    Emergency,
    /// Individual service latched; we told the controller and hung up.
    Service,
    /// The socket died or the receiver saw an error.
    Lost,
    /// The process is stopping.
    Shutdown,
}

/// Start the thread that mirrors block broadcasts onto an async channel.
pub(crate) fn spawn_watcher(
    block: Arc<SharedBlock>,
    stop: CancellationToken,
) -> std::io::Result<(mpsc::Receiver<RawState>, std::thread::JoinHandle<()>)> {
    let (tx, rx) = mpsc::channel(64);
    let handle = std::thread::Builder::new()
        .name("state-watch".to_owned())
        .spawn(move || watch(&block, &tx, &stop))?;
    Ok((rx, handle))
}

fn watch(block: &SharedBlock, tx: &mpsc::Sender<RawState>, stop: &CancellationToken) {
    let mut last: Option<RawState> = None;
    loop {
        // Sleep only while the state matches what we last relayed; a
        // broadcast that lands while we are off the condvar is then caught
        // by the re-read instead of being lost.
        let raw = {
            let mut guard = block.lock();
            loop {
                if stop.is_cancelled() {
                    return;
                }
                let raw = guard.raw();
                if last != Some(raw) {
                    break raw;
                }
                guard.wait();
            }
        };
        last = Some(raw);
        if tx.blocking_send(raw).is_err() {
            break;
        }
    }
}

/// Connect-and-serve loop. Returns when the process stops.
pub(crate) async fn run(
    block: &Arc<SharedBlock>,
    config: &CarConfig,
    mut updates: mpsc::Receiver<RawState>,
    stop: CancellationToken,
) {
    let delay = config.delay();
    loop {
        if stop.is_cancelled() {
            break;
        }
        let raw = block.raw();
        if raw.emergency_mode == 0 && raw.individual_service_mode == 0 {
            match TcpStream::connect(&config.controller).await {
                Ok(stream) => {
                    let end = serve_link(block, config, stream, &mut updates, &stop).await;
                    debug!(?end, "controller link ended");
                    if end == LinkEnd::Shutdown {
                        break;
                    }
                }
                Err(e) => {
                    debug!(error = %e, controller = %config.controller, "controller unreachable");
                }
            }
        }
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn serve_link(
    block: &Arc<SharedBlock>,
    config: &CarConfig,
    stream: TcpStream,
    updates: &mut mpsc::Receiver<RawState>,
    stop: &CancellationToken,
) -> LinkEnd {
    // Snapshots queued while disconnected describe a conversation that
    // never happened; start the link from the current state.
    while updates.try_recv().is_ok() {}

    let (reader, mut writer) = stream.into_split();

    let hello = Message::Register {
        name: config.name.clone(),
        lowest: config.lowest,
        highest: config.highest,
    };
    if frame::write_frame(&mut writer, &hello.encode()).await.is_err() {
        return LinkEnd::Lost;
    }
    let mut last = None;
    let raw = block.raw();
    if let Some(msg) = status_message(&raw) {
        if frame::write_frame(&mut writer, &msg.encode()).await.is_err() {
            return LinkEnd::Lost;
        }
        last = Some(raw);
    }
    info!(controller = %config.controller, "registered with controller");

    let link_stop = stop.child_token();
    let receiver = tokio::spawn(receive(reader, Arc::clone(block), link_stop.clone()));
    let end = stream_updates(&mut writer, updates, &link_stop, stop, last).await;
    link_stop.cancel();
    let _ = receiver.await;
    end
}

/// Relay state snapshots to the controller until the link ends.
async fn stream_updates(
    writer: &mut OwnedWriteHalf,
    updates: &mut mpsc::Receiver<RawState>,
    link_stop: &CancellationToken,
    stop: &CancellationToken,
    mut last: Option<RawState>,
) -> LinkEnd {
    loop {
        let raw = tokio::select! {
            _ = link_stop.cancelled() => {
                return if stop.is_cancelled() { LinkEnd::Shutdown } else { LinkEnd::Lost };
            }
            raw = updates.recv() => match raw {
                Some(raw) => raw,
                None => return LinkEnd::Shutdown,
            },
        };
        if Some(raw) == last {
            // Spurious wake or a broadcast that changed nothing visible.
            continue;
        }
        if raw.emergency_mode == 1 {
            let _ = frame::write_frame(writer, &Message::Emergency.encode()).await;
            info!("emergency latched, leaving controller service");
            return LinkEnd::Emergency;
        }
        if raw.individual_service_mode == 1 {
            let _ = frame::write_frame(writer, &Message::IndividualService.encode()).await;
            info!("individual service mode, leaving controller service");
            return LinkEnd::Service;
        }
        if let Some(msg) = status_message(&raw) {
            if frame::write_frame(writer, &msg.encode()).await.is_err() {
                return LinkEnd::Lost;
            }
        }
        // An undecodable snapshot is the safety monitor's problem, not the
        // controller's.
        last = Some(raw);
    }
}

/// Apply controller commands to the block until the link ends.
async fn receive(mut reader: OwnedReadHalf, block: Arc<SharedBlock>, link_stop: CancellationToken) {
    loop {
        let result = tokio::select! {
            _ = link_stop.cancelled() => return,
            result = frame::read_frame(&mut reader) => result,
        };
        match result {
            Ok(payload) => {
                if let Ok(Message::Floor { floor }) = Message::parse(&payload) {
                    let mut guard = block.lock();
                    if guard.destination() == Some(floor) {
                        // Already targeted here: cycle the doors in place.
                        guard.set_open_button(true);
                    } else {
                        guard.set_destination(floor);
                    }
                    guard.broadcast();
                }
            }
            Err(_) => {
                link_stop.cancel();
                return;
            }
        }
    }
}

fn status_message(raw: &RawState) -> Option<Message> {
    Some(Message::Status {
        status: raw.decode_status()?,
        current: raw.decode_current()?,
        destination: raw.decode_destination()?,
    })
}

#[cfg(test)]
#[path = "liaison_tests.rs"]
mod tests;
