//! CLI - Command Line Interface for castsync
//!
//! Every command is scriptable. All output is JSON-parseable.
//!
//! # Examples
//!
//! ```bash
//! # Play an episode locally, resuming from saved progress
//! castsync play ep-series1-s01e05 --type episode
//!
//! # Cast to a device
//! castsync play movie-42 --type movie --device "Living Room TV"
//!
//! # Inspect a receiver
//! castsync status --device "Living Room TV" --json
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;

use crate::models::MediaType;

// =============================================================================
// Exit Codes
// =============================================================================

/// Exit codes for CLI operations (semantic for scripting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// General error
    Error = 1,
    /// Invalid arguments
    InvalidArgs = 2,
    /// Network error
    NetworkError = 3,
    /// Device not found
    DeviceNotFound = 4,
    /// Playback failed
    PlaybackFailed = 5,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> std::process::ExitCode {
        std::process::ExitCode::from(code as u8)
    }
}

// =============================================================================
// Main CLI Structure
// =============================================================================

/// castsync - play media locally or on a Chromecast, with synced progress
#[derive(Parser, Debug)]
#[command(
    name = "castsync",
    version,
    author = "Gorka & Hermes",
    about = "Synced local and Chromecast playback for a media server",
    long_about = "Plays media from a companion media server either locally (mpv) \
                  or on a Chromecast, keeps watch progress saved on the server, \
                  and auto-continues series to the next episode.",
    after_help = "EXAMPLES:\n\
                  castsync play ep-a1b2 --type episode        Play locally, resume\n\
                  castsync play movie-9 --type movie -d TV    Cast to a device\n\
                  castsync devices                            Scan for devices\n\
                  castsync status -d TV --json                Receiver status"
)]
pub struct Cli {
    /// Output format as JSON (default for non-TTY)
    #[arg(long, short = 'j', global = true)]
    pub json: bool,

    /// Target Chromecast device name
    #[arg(long, short = 'd', global = true)]
    pub device: Option<String>,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Media server URL (overrides config and CASTSYNC_SERVER)
    #[arg(long, short = 's', global = true)]
    pub server: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Check if JSON output should be used
    pub fn should_json(&self) -> bool {
        self.json || !std::io::stdout().is_terminal()
    }
}

// =============================================================================
// Subcommands
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play a media item (locally, or cast with --device)
    #[command(visible_alias = "p")]
    Play(PlayCmd),

    /// List available Chromecast devices
    #[command(visible_alias = "dev")]
    Devices(DevicesCmd),

    /// Get current receiver playback status
    Status(StatusCmd),
}

#[derive(Args, Debug)]
pub struct PlayCmd {
    /// Media id as known to the server
    pub media_id: String,

    /// Kind of media item
    #[arg(long = "type", short = 't', value_enum, default_value = "episode")]
    pub media_type: MediaTypeArg,

    /// Display title (defaults to the media id)
    #[arg(long)]
    pub title: Option<String>,

    /// Start from the beginning, ignoring saved progress
    #[arg(long)]
    pub no_resume: bool,
}

#[derive(Args, Debug)]
pub struct DevicesCmd {}

#[derive(Args, Debug)]
pub struct StatusCmd {}

/// Media type as a CLI argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MediaTypeArg {
    Movie,
    Episode,
}

impl From<MediaTypeArg> for MediaType {
    fn from(arg: MediaTypeArg) -> MediaType {
        match arg {
            MediaTypeArg::Movie => MediaType::Movie,
            MediaTypeArg::Episode => MediaType::Episode,
        }
    }
}

// =============================================================================
// JSON Output Types
// =============================================================================

/// Generic JSON output wrapper with status
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub exit_code: i32,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

impl<T: Serialize> JsonOutput<T> {
    /// Create success output with data
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            exit_code: 0,
        }
    }

    /// Create error output (no data)
    pub fn error_msg(msg: impl Into<String>, code: ExitCode) -> JsonOutput<()> {
        JsonOutput::<()> {
            data: None,
            error: Some(msg.into()),
            exit_code: code.into(),
        }
    }
}

// =============================================================================
// Output Handler
// =============================================================================

/// Handles output formatting based on CLI flags
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    pub fn new(cli: &Cli) -> Self {
        Self {
            json: cli.should_json(),
            quiet: cli.quiet,
        }
    }

    /// Print success data
    pub fn print<T: Serialize>(&self, data: T) -> anyhow::Result<()> {
        if self.json {
            let output = JsonOutput::success(data);
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Ok(())
    }

    /// Print error and return exit code
    pub fn error(&self, msg: impl Into<String>, code: ExitCode) -> ExitCode {
        let msg = msg.into();
        if self.json {
            let output = JsonOutput::<()>::error_msg(&msg, code);
            if let Ok(json) = serde_json::to_string_pretty(&output) {
                eprintln!("{}", json);
            }
        } else if !self.quiet {
            eprintln!("Error: {}", msg);
        }
        code
    }

    /// Print info message (suppressed in quiet and JSON modes)
    pub fn info(&self, msg: impl std::fmt::Display) {
        if !self.quiet && !self.json {
            eprintln!("{}", msg);
        }
    }
}
