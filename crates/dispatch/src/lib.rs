// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! liftd: the central dispatcher for the lift control system.
//!
//! Cars register over TCP and stream status updates; call pads open
//! transient connections carrying one ride request each. A single
//! dispatcher task owns every registration and per-car stop queue.

pub mod config;
pub mod dispatch;
pub mod registry;
pub mod sched;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::DispatchConfig;
use crate::dispatch::{greet, Dispatcher, Event};

/// Bind the configured address and serve until SIGINT/SIGTERM.
pub async fn run(config: DispatchConfig) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&config.listen).await?;
    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());
    serve(listener, config, shutdown).await
}

/// Serve an already-bound listener until the token is cancelled.
///
/// Split from [`run`] so tests can bind port 0 and learn the real address.
pub async fn serve(
    listener: TcpListener,
    config: DispatchConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "controller listening");

    let (event_tx, mut event_rx) = mpsc::channel::<Event>(256);
    let mut dispatcher = Dispatcher::new(config.car_slots, event_tx.clone(), shutdown.clone());

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "connection accepted");
                        tokio::spawn(greet(stream, event_tx.clone(), shutdown.clone()));
                    }
                    Err(e) => {
                        debug!(error = %e, "accept failed");
                    }
                }
            }
            event = event_rx.recv() => {
                match event {
                    Some(event) => dispatcher.handle(event).await,
                    None => break,
                }
            }
        }
    }

    info!("controller shutting down");
    Ok(())
}

/// First SIGINT/SIGTERM cancels the token for a cooperative shutdown; a
/// second one forces the process out.
fn spawn_signal_handler(shutdown: CancellationToken) {
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
        shutdown.cancel();

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
