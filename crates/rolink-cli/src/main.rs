//! `rolink` – command/telemetry bridge between an operator surface and a robot.
//!
//! ```text
//! rolink robot                   # robot side: listen, drive simulated capabilities
//! rolink bridge                  # bridge side: connect, read commands from stdin
//! rolink loopback --duration 30  # both sides in one process
//! ```
//!
//! Configuration comes from `~/.rolink/config.toml` (or `--config`), then
//! `ROLINK_*` environment variables, then command-line flags. Ctrl-C stops
//! every loop within one poll timeout.

mod config;
mod console;
mod loopback;
mod roles;
mod telemetry;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use rolink_middleware::ShutdownSignal;
use rolink_types::BridgeError;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "rolink")]
#[command(about = "Command/telemetry bridge between an operator surface and a robot", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (default: ~/.rolink/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect to a robot endpoint and accept commands on stdin.
    Bridge {
        /// Robot endpoint address (overrides `bridge.robot_endpoint`).
        #[arg(long)]
        robot: Option<String>,

        /// Telemetry gateway base URL; "" disables egress.
        #[arg(long)]
        gateway: Option<String>,
    },

    /// Listen for a bridge and drive simulated robot capabilities.
    Robot {
        /// Listen address (overrides `robot.listen`).
        #[arg(long)]
        listen: Option<String>,
    },

    /// Run both sides in this process over an in-process link.
    Loopback {
        /// Stop after this many seconds.
        #[arg(long)]
        duration: Option<u64>,
    },
}

fn main() -> ExitCode {
    let _guard = telemetry::init_tracing("rolink");
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, fatal = e.is_fatal(), "rolink stopped");
            eprintln!("rolink: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), BridgeError> {
    let mut cfg = config::load(cli.config.as_deref())?;

    let shutdown = ShutdownSignal::new();
    let on_ctrlc = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Ctrl-C received; shutting down");
        on_ctrlc.trigger();
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| BridgeError::Config(format!("cannot start async runtime: {e}")))?;

    runtime.block_on(async move {
        match cli.command {
            Command::Bridge { robot, gateway } => {
                if let Some(robot) = robot {
                    cfg.bridge.robot_endpoint = robot;
                }
                if let Some(gateway) = gateway {
                    cfg.bridge.gateway_url = gateway;
                }
                roles::run_bridge(&cfg, shutdown).await
            }
            Command::Robot { listen } => {
                if let Some(listen) = listen {
                    cfg.robot.listen = listen;
                }
                roles::run_robot(&cfg, shutdown).await
            }
            Command::Loopback { duration } => {
                loopback::run(&cfg, shutdown, duration.map(Duration::from_secs)).await
            }
        }
    })
}
