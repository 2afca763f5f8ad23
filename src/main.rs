//! castsync - synced local and Chromecast playback for a media server
//!
//! # Usage
//!
//! ```bash
//! # Play an episode locally, resuming from saved progress
//! castsync play ep-series1-s01e05
//!
//! # Cast a movie to a device
//! castsync play movie-42 --type movie --device "Living Room TV"
//!
//! # Discovery and diagnostics
//! castsync devices
//! castsync status -d "Living Room TV" --json
//! ```

use clap::Parser;
use tracing_subscriber::EnvFilter;

use castsync::cli::{Cli, Command, ExitCode, Output};
use castsync::commands;
use castsync::config::Config;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("castsync=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output = Output::new(&cli);

    let mut config = Config::load();
    if let Some(server) = &cli.server {
        config.server_url_override = Some(server.clone());
    }

    let device = cli.device.as_deref();

    let exit_code = match cli.command {
        Command::Play(cmd) => commands::play_cmd(cmd, device, &config, &output).await,
        Command::Devices(cmd) => commands::devices_cmd(cmd, &config, &output).await,
        Command::Status(cmd) => commands::status_cmd(cmd, device, &config, &output).await,
    };

    std::process::exit(exit_code.into());
}
