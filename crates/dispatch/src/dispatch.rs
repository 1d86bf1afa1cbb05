// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The dispatcher: a single task owning the registry and every queue.
//!
//! Connections are multiplexed onto one mpsc event stream. A fresh
//! connection produces exactly one greeting event after its first frame is
//! read; registered car sockets get a thin reader task that forwards frames
//! and reports the peer going away. All registry mutation happens on the
//! dispatcher task, so no locking is needed anywhere in the controller.

use std::time::Duration;

use liftcore::floor::{Floor, FloorRange};
use liftcore::frame;
use liftcore::proto::Message;
use liftcore::state::Status;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::registry::{CarReg, Registry};
use crate::sched::StopQueue;

/// How long a fresh connection may take to produce its greeting frame.
const GREET_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything the dispatcher reacts to.
pub enum Event {
    /// A fresh connection delivered its first frame.
    Greeting { stream: TcpStream, msg: Message },
    /// A registered car sent a frame.
    FromCar { token: u64, msg: Message },
    /// A registered car's socket failed or closed.
    Gone { token: u64 },
}

pub struct Dispatcher {
    registry: Registry,
    events: mpsc::Sender<Event>,
    shutdown: CancellationToken,
    next_token: u64,
}

impl Dispatcher {
    pub fn new(
        car_slots: usize,
        events: mpsc::Sender<Event>,
        shutdown: CancellationToken,
    ) -> Dispatcher {
        Dispatcher {
            registry: Registry::new(car_slots),
            events,
            shutdown,
            next_token: 0,
        }
    }

    pub async fn handle(&mut self, event: Event) {
        match event {
            Event::Greeting { stream, msg } => self.handle_greeting(stream, msg).await,
            Event::FromCar { token, msg } => self.handle_car_frame(token, msg).await,
            Event::Gone { token } => {
                if let Some(reg) = self.registry.withdraw(token) {
                    info!(car = %reg.name, "car connection lost");
                }
            }
        }
    }

    async fn handle_greeting(&mut self, stream: TcpStream, msg: Message) {
        match msg {
            Message::Call { source, destination } => {
                self.dispatch_call(stream, source, destination).await;
            }
            Message::Register { name, lowest, highest } => {
                self.register_car(stream, name, lowest, highest);
            }
            other => {
                debug!(?other, "ignoring greeting that is neither CALL nor CAR");
            }
        }
    }

    /// Pick the first registered car covering both legs, queue the ride,
    /// answer the call pad, and announce the next stop if none is pending.
    async fn dispatch_call(&mut self, mut pad: TcpStream, source: Floor, destination: Floor) {
        let Some(token) = self
            .registry
            .first_covering(source, destination)
            .map(|reg| reg.token)
        else {
            info!(%source, %destination, "no car covers call");
            let _ = frame::write_frame(&mut pad, &Message::Unavailable.encode()).await;
            return;
        };

        let (name, announce) = {
            // Token was just looked up; the entry is still present.
            let Some(reg) = self.registry.get_mut(token) else {
                return;
            };
            reg.queue.insert_pair(source, destination);
            let announce = if reg.queue.awaiting_arrival() {
                // The car is already heading somewhere; later stops are
                // announced as it arrives.
                None
            } else {
                reg.queue.next_undisplayed()
            };
            (reg.name.clone(), announce)
        };

        info!(car = %name, %source, %destination, "call dispatched");
        let _ = frame::write_frame(&mut pad, &Message::Car { name }.encode()).await;
        if let Some(floor) = announce {
            self.announce(token, floor).await;
        }
    }

    fn register_car(&mut self, stream: TcpStream, name: String, lowest: Floor, highest: Floor) {
        let Ok(range) = FloorRange::new(lowest, highest) else {
            warn!(car = %name, %lowest, %highest, "rejecting inverted service range");
            return;
        };
        if self.registry.is_full() {
            warn!(car = %name, "registry full, refusing car");
            return;
        }
        self.next_token += 1;
        let token = self.next_token;
        let (reader, writer) = stream.into_split();
        let reg = CarReg {
            token,
            name,
            range,
            writer,
            queue: StopQueue::new(),
        };
        info!(car = %reg.name, %lowest, %highest, "car registered");
        if self.registry.admit(reg).is_ok() {
            tokio::spawn(car_reader(
                reader,
                token,
                self.events.clone(),
                self.shutdown.clone(),
            ));
        }
    }

    async fn handle_car_frame(&mut self, token: u64, msg: Message) {
        match msg {
            Message::Status { status, current, destination } => {
                debug!(token, %status, %current, %destination, "car status");
                if status == Status::Opening {
                    self.arrived(token, current).await;
                }
            }
            Message::Emergency => {
                if let Some(reg) = self.registry.withdraw(token) {
                    info!(car = %reg.name, "car withdrew: emergency");
                }
            }
            Message::IndividualService => {
                if let Some(reg) = self.registry.withdraw(token) {
                    info!(car = %reg.name, "car withdrew: individual service");
                }
            }
            other => {
                debug!(token, ?other, "ignoring unexpected car frame");
            }
        }
    }

    /// The car opened its doors. If that is the stop we last announced,
    /// retire it and announce the next one.
    async fn arrived(&mut self, token: u64, current: Floor) {
        let next = {
            let Some(reg) = self.registry.get_mut(token) else {
                return;
            };
            if reg.queue.is_empty() || reg.queue.prev_displayed() != Some(current) {
                return;
            }
            reg.queue.pop_head();
            reg.queue.next_undisplayed()
        };
        if let Some(floor) = next {
            self.announce(token, floor).await;
        }
    }

    /// Send `FLOOR` to a car; a dead socket withdraws the car.
    async fn announce(&mut self, token: u64, floor: Floor) {
        let Some(reg) = self.registry.get_mut(token) else {
            return;
        };
        debug!(car = %reg.name, %floor, "announcing stop");
        if frame::write_frame(&mut reg.writer, &Message::Floor { floor }.encode())
            .await
            .is_err()
        {
            if let Some(reg) = self.registry.withdraw(token) {
                info!(car = %reg.name, "car withdrew: write failed");
            }
        }
    }
}

/// Read a fresh connection's first frame, with a deadline.
pub async fn greet(
    mut stream: TcpStream,
    events: mpsc::Sender<Event>,
    shutdown: CancellationToken,
) {
    let first = tokio::select! {
        _ = shutdown.cancelled() => return,
        first = tokio::time::timeout(GREET_TIMEOUT, frame::read_frame(&mut stream)) => first,
    };
    let payload = match first {
        Ok(Ok(payload)) => payload,
        Ok(Err(e)) => {
            debug!(error = %e, "dropping connection with unreadable greeting");
            return;
        }
        Err(_) => {
            debug!("dropping connection that never sent a greeting");
            return;
        }
    };
    match Message::parse(&payload) {
        Ok(msg) => {
            let _ = events.send(Event::Greeting { stream, msg }).await;
        }
        Err(_) => {
            debug!(payload, "dropping connection with unparseable greeting");
        }
    }
}

/// Forward a registered car's frames to the dispatcher until the socket
/// dies. Malformed frames are skipped; the connection survives them.
async fn car_reader(
    mut reader: OwnedReadHalf,
    token: u64,
    events: mpsc::Sender<Event>,
    shutdown: CancellationToken,
) {
    loop {
        let result = tokio::select! {
            _ = shutdown.cancelled() => return,
            result = frame::read_frame(&mut reader) => result,
        };
        match result {
            Ok(payload) => {
                if let Ok(msg) = Message::parse(&payload) {
                    if events.send(Event::FromCar { token, msg }).await.is_err() {
                        return;
                    }
                }
            }
            Err(_) => {
                let _ = events.send(Event::Gone { token }).await;
                return;
            }
        }
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
