mod app;
mod cli;
mod http_client;
mod server;
mod telemetry;

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};

use crate::app::App;
use crate::cli::{Cli, Command};
use crate::telemetry::init_telemetry;

/// Exit status when the exporter fails to start
const EXIT_STARTUP_ERROR: u8 = 1;
/// Exit status when the running server fails
const EXIT_RUNTIME_ERROR: u8 = 2;

/// Where in the lifecycle the exporter stopped with an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Startup,
    Runtime,
}

impl Phase {
    fn exit_code(self) -> u8 {
        match self {
            Self::Startup => EXIT_STARTUP_ERROR,
            Self::Runtime => EXIT_RUNTIME_ERROR,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let Command::Serve(args) = cli.command;

    if let Err(err) = init_telemetry(&args) {
        eprintln!("{err:#}");
        return ExitCode::from(Phase::Startup.exit_code());
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Spacelift Prometheus exporter");

    let app = match App::build(args).await {
        Ok(app) => app,
        Err(err) => {
            error!("Startup error: {:#}", err);
            return ExitCode::from(Phase::Startup.exit_code());
        }
    };

    if let Err(err) = app.run().await {
        error!("Application error: {:#}", err);
        return ExitCode::from(Phase::Runtime.exit_code());
    }

    ExitCode::SUCCESS
}
