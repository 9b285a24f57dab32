//! periphctl: interactive controller for the peripheral board.
//!
//! ```text
//!   stdin ──▶ console::parse ──▶ ControlService ──▶ SerialLink ──▶ board
//!                                     ▲                              │
//!                                     └──────── Ingestion ◀──────────┘
//! ```
#![deny(unused_must_use)]

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use periphctl::app::service::ControlService;
use periphctl::config::ControlConfig;
use periphctl::console;

#[derive(Parser, Debug)]
#[command(
    name = "periphctl",
    version,
    about = "Remote control and automation for a serial peripheral board"
)]
struct Cli {
    /// JSON configuration file; missing fields take their defaults
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Serial device, e.g. /dev/ttyACM0 or COM6
    #[arg(long, short = 'p', value_name = "PORT")]
    port: Option<String>,

    /// Baud rate
    #[arg(long, short = 'b', value_name = "BAUD")]
    baud: Option<u32>,
}

fn load_config(cli: &Cli) -> Result<ControlConfig> {
    let mut config = match &cli.config {
        Some(path) => ControlConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ControlConfig::default(),
    };
    if let Some(port) = &cli.port {
        config.link.port.clone_from(port);
    }
    if let Some(baud) = cli.baud {
        config.link.baud_rate = baud;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    info!("===================================");
    info!("  periphctl v{}", env!("CARGO_PKG_VERSION"));
    info!("  port {} @ {} baud", config.link.port, config.link.baud_rate);
    info!("===================================");

    let mut service = ControlService::connect(&config)
        .with_context(|| format!("connecting to {}", config.link.port))?;
    println!("Connected. Type 'help' for commands.");

    console::run(&service, io::stdin().lock(), io::stdout()).context("console I/O")?;

    service.shutdown();
    info!("Goodbye");
    Ok(())
}
