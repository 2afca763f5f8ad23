//! CLI Command Handlers
//!
//! Each handler takes CLI args and Output, returns ExitCode.

use serde::Serialize;

use crate::cli::{DevicesCmd, ExitCode, Output, PlayCmd, StatusCmd};
use crate::config::Config;
use crate::models::format_duration;
use crate::playback::{scan_devices, CastError, CastTransport, CattTransport};
use crate::player::{Player, PlayerOptions};

// =============================================================================
// Play Command
// =============================================================================

pub async fn play_cmd(
    cmd: PlayCmd,
    device: Option<&str>,
    config: &Config,
    output: &Output,
) -> ExitCode {
    let title = cmd.title.clone().unwrap_or_else(|| cmd.media_id.clone());
    let player = Player::new(config, &cmd.media_id, cmd.media_type.into(), &title);

    match device {
        Some(d) => output.info(format!("Casting '{}' to {}...", title, d)),
        None => output.info(format!("Playing '{}'...", title)),
    }

    let options = PlayerOptions {
        resume: !cmd.no_resume,
        device: device.map(String::from),
    };

    match player.run(options).await {
        Ok(()) => ExitCode::Success,
        Err(e) => output.error(format!("{:#}", e), ExitCode::PlaybackFailed),
    }
}

// =============================================================================
// Devices Command
// =============================================================================

pub async fn devices_cmd(_cmd: DevicesCmd, config: &Config, output: &Output) -> ExitCode {
    output.info("Scanning for Chromecast devices...");

    let transport = CattTransport::new(config.catt_path());
    match scan_devices(&transport).await {
        Ok(devices) => {
            if devices.is_empty() {
                return output.error("No Chromecast devices found", ExitCode::DeviceNotFound);
            }
            if let Err(e) = output.print(&devices) {
                return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
            }
            ExitCode::Success
        }
        Err(e @ CastError::CattNotFound) => output.error(e.to_string(), ExitCode::Error),
        Err(e) => output.error(format!("Scan failed: {}", e), ExitCode::NetworkError),
    }
}

// =============================================================================
// Status Command
// =============================================================================

/// Receiver status as reported over the CLI
#[derive(Debug, Serialize)]
pub struct ReceiverStatus {
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    pub position: f64,
    pub duration: f64,
    pub volume: f32,
}

pub async fn status_cmd(
    _cmd: StatusCmd,
    device: Option<&str>,
    config: &Config,
    output: &Output,
) -> ExitCode {
    let Some(device) = device.map(String::from).or_else(|| config.default_device.clone())
    else {
        return output.error(
            "No device given (use --device or set default_device in config)",
            ExitCode::InvalidArgs,
        );
    };

    let transport = CattTransport::new(config.catt_path());
    let args = vec!["-d".to_string(), device.clone(), "status".to_string()];

    match transport.run(&args).await {
        Ok(raw) => match crate::models::RemoteStatus::parse(&raw) {
            Some(status) => {
                output.info(format!(
                    "{}: {} {} / {}",
                    device,
                    status.state,
                    format_duration(status.position),
                    format_duration(status.duration)
                ));
                let report = ReceiverStatus {
                    state: status.state.to_string(),
                    device: Some(device),
                    position: status.position,
                    duration: status.duration,
                    volume: status.volume,
                };
                if let Err(e) = output.print(&report) {
                    return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
                }
                ExitCode::Success
            }
            None => output.error(
                format!("Could not parse receiver status from '{}'", device),
                ExitCode::Error,
            ),
        },
        Err(e @ CastError::CattNotFound) => output.error(e.to_string(), ExitCode::Error),
        Err(CastError::CommandFailed(msg)) => {
            output.error(format!("Receiver unreachable: {}", msg), ExitCode::DeviceNotFound)
        }
        Err(e) => output.error(format!("Status failed: {}", e), ExitCode::NetworkError),
    }
}
