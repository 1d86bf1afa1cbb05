// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The call pad: one ride request, one reply.

use clap::Args;
use liftcore::floor::Floor;
use liftcore::frame::{read_frame, write_frame};
use liftcore::proto::Message;
use tokio::net::TcpStream;

/// Arguments for requesting a ride.
#[derive(Debug, Clone, Args)]
pub struct CallArgs {
    /// Floor the passenger is calling from.
    pub source: String,

    /// Floor the passenger wants to reach.
    pub destination: String,

    /// Controller address.
    #[arg(long, env = "CAB_CONTROLLER", default_value = "127.0.0.1:3000")]
    pub controller: String,
}

/// Outcome of a ride request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallReply {
    /// The named car is on its way.
    Assigned(String),
    /// No registered car covers the ride.
    Unavailable,
}

/// Run the call pad conversation and print the user-facing result.
pub async fn run(args: &CallArgs) -> i32 {
    let (Ok(source), Ok(destination)) =
        (args.source.parse::<Floor>(), args.destination.parse::<Floor>())
    else {
        println!("Invalid floor(s) specified.");
        return 1;
    };
    if source == destination {
        println!("You are already on that floor!");
        return 0;
    }
    match request(&args.controller, source, destination).await {
        Ok(CallReply::Assigned(name)) => {
            println!("Car {name} is arriving.");
            0
        }
        Ok(CallReply::Unavailable) => {
            println!("Sorry, no car is available to take this request.");
            0
        }
        Err(_) => {
            println!("Unable to connect to elevator system.");
            1
        }
    }
}

/// One request/reply exchange with the controller.
pub async fn request(
    controller: &str,
    source: Floor,
    destination: Floor,
) -> anyhow::Result<CallReply> {
    let mut stream = TcpStream::connect(controller).await?;
    let msg = Message::Call { source, destination };
    write_frame(&mut stream, &msg.encode()).await?;
    let reply = read_frame(&mut stream).await?;
    match Message::parse(&reply) {
        Ok(Message::Car { name }) => Ok(CallReply::Assigned(name)),
        Ok(Message::Unavailable) => Ok(CallReply::Unavailable),
        other => anyhow::bail!("unexpected controller reply: {other:?}"),
    }
}

#[cfg(test)]
#[path = "call_tests.rs"]
mod tests;
