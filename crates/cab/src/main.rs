// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use cab::call::CallArgs;
use cab::config::CarConfig;
use cab::internal::InternalArgs;
use cab::safety::SafetyArgs;

#[derive(Parser)]
#[command(name = "cab", version, about = "One lift car and its operator-side tooling.")]
struct Cli {
    #[command(subcommand)]
    subcommand: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run a car agent until SIGINT.
    Car(CarConfig),
    /// Request a ride from the controller.
    Call(CallArgs),
    /// Apply one service-panel operation to a running car.
    Internal(InternalArgs),
    /// Run the safety monitor for a car.
    Safety(SafetyArgs),
}

#[tokio::main]
async fn main() {
    // Diagnostics stay on stderr; stdout is the user-facing surface of the
    // one-shot subcommands.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().subcommand {
        Commands::Car(config) => {
            if let Err(e) = cab::car::run(config).await {
                error!("fatal: {e:#}");
                std::process::exit(1);
            }
        }
        Commands::Call(args) => {
            std::process::exit(cab::call::run(&args).await);
        }
        Commands::Internal(args) => {
            std::process::exit(cab::internal::run(&args));
        }
        Commands::Safety(args) => {
            std::process::exit(cab::safety::run(&args).await);
        }
    }
}
