//! Data structures and types for castsync
//!
//! Contains all shared models used across the engine organized by domain:
//! - **Media**: media identity and the merged playback session view
//! - **Events**: normalized playback events emitted by adapters
//! - **Cast**: Chromecast device info, session life cycle, polled status
//! - **Progress**: resume-position records exchanged with the media server
//! - **Series**: next-episode metadata used by the continuation engine

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use uuid::Uuid;

// =============================================================================
// Media Models
// =============================================================================

/// Media type discriminator, also the `type` query parameter for progress
/// endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Episode,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Episode => "episode",
        }
    }

    /// Only series items participate in auto-continuation
    pub fn is_series(&self) -> bool {
        matches!(self, MediaType::Episode)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaType::Movie => write!(f, "Movie"),
            MediaType::Episode => write!(f, "Episode"),
        }
    }
}

/// Which playback engine currently owns the canonical position/playing state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Authority {
    Local,
    Remote,
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authority::Local => write!(f, "local"),
            Authority::Remote => write!(f, "remote"),
        }
    }
}

/// The single merged "now playing" view consumed by the UI and the
/// continuation engine. Exactly one authority is live at a time; switching
/// authority transfers position and playing state atomically.
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackSession {
    pub media_id: String,
    pub media_type: MediaType,
    pub title: String,
    /// Total duration in seconds; 0.0 until metadata is known
    pub duration: f64,
    /// Current position in seconds
    pub position: f64,
    pub is_playing: bool,
    /// Buffered-ahead watermark in seconds (local playback only)
    pub buffered: f64,
    pub authority: Authority,
}

impl PlaybackSession {
    pub fn new(
        media_id: impl Into<String>,
        media_type: MediaType,
        title: impl Into<String>,
    ) -> Self {
        Self {
            media_id: media_id.into(),
            media_type,
            title: title.into(),
            duration: 0.0,
            position: 0.0,
            is_playing: false,
            buffered: 0.0,
            authority: Authority::Local,
        }
    }

    /// Seconds left until the end of the media, clamped at zero
    pub fn remaining(&self) -> f64 {
        (self.duration - self.position).max(0.0)
    }

    /// Progress as a 0.0-1.0 fraction
    pub fn progress(&self) -> f64 {
        if self.duration <= 0.0 {
            0.0
        } else {
            (self.position / self.duration).clamp(0.0, 1.0)
        }
    }
}

impl fmt::Display for PlaybackSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_playing { "▶" } else { "⏸" };
        write!(
            f,
            "{} {} {} / {} [{}]",
            state,
            self.title,
            format_duration(self.position),
            format_duration(self.duration),
            self.authority
        )
    }
}

// =============================================================================
// Normalized Playback Events
// =============================================================================

/// Normalized event emitted by an adapter; the store consumes these without
/// knowing which engine produced them
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Started,
    Paused,
    TimeUpdated { position: f64, buffered: f64 },
    MetadataLoaded { duration: f64 },
    Stalled,
    Ended,
    Errored(String),
}

// =============================================================================
// Cast Models (Chromecast)
// =============================================================================

/// Chromecast device discovered on the network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastDevice {
    pub name: String,
    pub address: IpAddr,
    pub model: Option<String>,
}

impl CastDevice {
    /// Parse devices from catt scan output.
    /// Format (catt 0.13+): "192.168.1.36 - Device Name - Google Inc. Chromecast"
    pub fn parse_scan(output: &str) -> Vec<CastDevice> {
        output
            .lines()
            .filter_map(|line| {
                let line = line.trim();
                if line.is_empty() || line.starts_with("Scanning") || line.contains("No devices") {
                    return None;
                }
                let mut parts = line.splitn(3, " - ");
                let address: IpAddr = parts.next()?.trim().parse().ok()?;
                let name = parts.next()?.trim().to_string();
                let model = parts.next().map(|m| m.trim().to_string());
                Some(CastDevice { name, address, model })
            })
            .collect()
    }
}

impl fmt::Display for CastDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.model {
            Some(model) => write!(f, "{} ({}) - {}", self.name, model, self.address),
            None => write!(f, "{} - {}", self.name, self.address),
        }
    }
}

/// Raw player state reported by the cast receiver. `Idle` is ambiguous: it
/// means both "not yet started" and "finished", so end-of-media is never
/// decided from this state alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemotePlayerState {
    Idle,
    Buffering,
    Playing,
    Paused,
    Unknown,
}

impl RemotePlayerState {
    /// Parse a vendor state string ("PLAYING", "IDLE", ...)
    pub fn from_vendor(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "IDLE" => RemotePlayerState::Idle,
            "BUFFERING" => RemotePlayerState::Buffering,
            "PLAYING" => RemotePlayerState::Playing,
            "PAUSED" => RemotePlayerState::Paused,
            _ => RemotePlayerState::Unknown,
        }
    }
}

impl fmt::Display for RemotePlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemotePlayerState::Idle => write!(f, "Idle"),
            RemotePlayerState::Buffering => write!(f, "Buffering"),
            RemotePlayerState::Playing => write!(f, "Playing"),
            RemotePlayerState::Paused => write!(f, "Paused"),
            RemotePlayerState::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Snapshot of receiver status from one poll tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteStatus {
    pub state: RemotePlayerState,
    /// Current position in seconds
    pub position: f64,
    /// Media duration in seconds; 0.0 when the receiver has nothing loaded
    pub duration: f64,
    /// Receiver volume, 0.0-1.0
    pub volume: f32,
}

impl RemoteStatus {
    /// Parse status from catt status output.
    /// Format:
    /// ```text
    /// State: PLAYING
    /// Duration: 10234.5
    /// Current time: 1234.5
    /// Volume: 80
    /// ```
    pub fn parse(output: &str) -> Option<Self> {
        let mut state = None;
        let mut position = 0.0;
        let mut duration = 0.0;
        let mut volume = 1.0;

        for line in output.lines() {
            let Some((key, value)) = line.trim().split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim().to_lowercase().as_str() {
                "state" => state = Some(RemotePlayerState::from_vendor(value)),
                "duration" => duration = value.parse().unwrap_or(0.0),
                "current time" => position = value.parse().unwrap_or(0.0),
                // catt reports volume 0-100
                "volume" => volume = value.parse::<f32>().map(|v| v / 100.0).unwrap_or(1.0),
                _ => {}
            }
        }

        state.map(|state| Self {
            state,
            position,
            duration,
            volume,
        })
    }

    /// Seconds left until the end of the loaded media, clamped at zero
    pub fn remaining(&self) -> f64 {
        (self.duration - self.position).max(0.0)
    }
}

impl fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} / {} ({}%)",
            self.state,
            format_duration(self.position),
            format_duration(self.duration),
            (self.volume * 100.0) as u8
        )
    }
}

/// Life cycle phase of a remote cast session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Starting,
    Started,
    Suspended,
    Ended,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::Starting => write!(f, "starting"),
            SessionPhase::Started => write!(f, "started"),
            SessionPhase::Suspended => write!(f, "suspended"),
            SessionPhase::Ended => write!(f, "ended"),
        }
    }
}

/// A remote cast session, exclusively owned by the RemoteSessionAdapter
#[derive(Debug, Clone, Serialize)]
pub struct RemoteCastSession {
    pub session_id: Uuid,
    pub device: String,
    pub phase: SessionPhase,
    pub volume: f32,
}

impl RemoteCastSession {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            device: device.into(),
            phase: SessionPhase::Starting,
            volume: 1.0,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, SessionPhase::Starting | SessionPhase::Started)
    }
}

// =============================================================================
// Progress Models
// =============================================================================

/// One logical resume record per (media_type, media_id); overwritten on save
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub media_type: MediaType,
    pub media_id: String,
    pub position: f64,
    pub duration: f64,
    pub completed: bool,
}

impl ProgressRecord {
    /// Completion window: within this many seconds of the end counts as done
    pub const COMPLETION_WINDOW_SECS: f64 = 2.0;

    pub fn new(
        media_type: MediaType,
        media_id: impl Into<String>,
        position: f64,
        duration: f64,
    ) -> Self {
        let completed = duration > 0.0 && (duration - position) <= Self::COMPLETION_WINDOW_SECS;
        Self {
            media_type,
            media_id: media_id.into(),
            position,
            duration,
            completed,
        }
    }
}

// =============================================================================
// Series Models
// =============================================================================

/// Next item in a series, as returned by the next-episode endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRef {
    pub id: String,
    pub season_number: u32,
    pub episode_number: u32,
    pub title: String,
}

impl fmt::Display for EpisodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "S{:02}E{:02} - {}",
            self.season_number, self.episode_number, self.title
        )
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Format seconds as HH:MM:SS or MM:SS
pub fn format_duration(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    let hours = total / 3600;
    let mins = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{:02}:{:02}", mins, secs)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // MediaType / Authority Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_media_type_serde() {
        let json = serde_json::to_string(&MediaType::Movie).unwrap();
        assert_eq!(json, "\"movie\"");

        let parsed: MediaType = serde_json::from_str("\"episode\"").unwrap();
        assert_eq!(parsed, MediaType::Episode);
    }

    #[test]
    fn test_media_type_as_str() {
        assert_eq!(MediaType::Movie.as_str(), "movie");
        assert_eq!(MediaType::Episode.as_str(), "episode");
    }

    #[test]
    fn test_authority_display() {
        assert_eq!(Authority::Local.to_string(), "local");
        assert_eq!(Authority::Remote.to_string(), "remote");
    }

    // -------------------------------------------------------------------------
    // PlaybackSession Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_session_remaining() {
        let mut session = PlaybackSession::new("m1", MediaType::Movie, "Test");
        session.duration = 600.0;
        session.position = 595.0;
        assert!((session.remaining() - 5.0).abs() < f64::EPSILON);

        // Position past duration clamps at zero
        session.position = 601.0;
        assert_eq!(session.remaining(), 0.0);
    }

    #[test]
    fn test_session_progress() {
        let mut session = PlaybackSession::new("m1", MediaType::Movie, "Test");
        assert_eq!(session.progress(), 0.0);

        session.duration = 600.0;
        session.position = 300.0;
        assert!((session.progress() - 0.5).abs() < 0.001);
    }

    // -------------------------------------------------------------------------
    // CastDevice Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_scan_output() {
        let output = "Scanning Chromecasts...\n192.168.1.50 - Living Room TV - Google Inc. Chromecast Ultra\n192.168.1.51 - Bedroom - Google Inc. Chromecast\n";
        let devices = CastDevice::parse_scan(output);

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].name, "Living Room TV");
        assert_eq!(devices[0].address.to_string(), "192.168.1.50");
        assert_eq!(
            devices[0].model,
            Some("Google Inc. Chromecast Ultra".to_string())
        );
        assert_eq!(devices[1].name, "Bedroom");
    }

    #[test]
    fn test_parse_scan_no_devices() {
        assert!(CastDevice::parse_scan("Scanning...\nNo devices found\n").is_empty());
        assert!(CastDevice::parse_scan("").is_empty());
    }

    #[test]
    fn test_cast_device_display() {
        let device = CastDevice {
            name: "Living Room TV".to_string(),
            address: "192.168.1.50".parse().unwrap(),
            model: Some("Chromecast Ultra".to_string()),
        };
        assert_eq!(
            device.to_string(),
            "Living Room TV (Chromecast Ultra) - 192.168.1.50"
        );
    }

    // -------------------------------------------------------------------------
    // RemotePlayerState Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_remote_state_from_vendor() {
        assert_eq!(RemotePlayerState::from_vendor("PLAYING"), RemotePlayerState::Playing);
        assert_eq!(RemotePlayerState::from_vendor("playing"), RemotePlayerState::Playing);
        assert_eq!(RemotePlayerState::from_vendor("PAUSED"), RemotePlayerState::Paused);
        assert_eq!(RemotePlayerState::from_vendor("BUFFERING"), RemotePlayerState::Buffering);
        assert_eq!(RemotePlayerState::from_vendor("IDLE"), RemotePlayerState::Idle);
        assert_eq!(RemotePlayerState::from_vendor("garbage"), RemotePlayerState::Unknown);
    }

    // -------------------------------------------------------------------------
    // RemoteStatus Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_remote_status() {
        let output = "State: PLAYING\nDuration: 10234.5\nCurrent time: 1234.5\nVolume: 80";
        let status = RemoteStatus::parse(output).unwrap();

        assert_eq!(status.state, RemotePlayerState::Playing);
        assert_eq!(status.duration, 10234.5);
        assert_eq!(status.position, 1234.5);
        assert!((status.volume - 0.8).abs() < 0.01);
    }

    #[test]
    fn test_parse_remote_status_idle_near_end() {
        let output = "State: IDLE\nDuration: 120\nCurrent time: 119\nVolume: 100";
        let status = RemoteStatus::parse(output).unwrap();

        assert_eq!(status.state, RemotePlayerState::Idle);
        assert!((status.remaining() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_remote_status_no_state_line() {
        // Output without a State line means the receiver gave us nothing usable
        assert!(RemoteStatus::parse("Nothing is currently playing.").is_none());
        assert!(RemoteStatus::parse("").is_none());
    }

    #[test]
    fn test_remote_status_remaining_clamps() {
        let status = RemoteStatus {
            state: RemotePlayerState::Idle,
            position: 130.0,
            duration: 120.0,
            volume: 1.0,
        };
        assert_eq!(status.remaining(), 0.0);
    }

    // -------------------------------------------------------------------------
    // RemoteCastSession Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_session_phase_active() {
        let mut session = RemoteCastSession::new("Living Room TV");
        assert_eq!(session.phase, SessionPhase::Starting);
        assert!(session.is_active());

        session.phase = SessionPhase::Started;
        assert!(session.is_active());

        session.phase = SessionPhase::Suspended;
        assert!(!session.is_active());

        session.phase = SessionPhase::Ended;
        assert!(!session.is_active());
    }

    // -------------------------------------------------------------------------
    // ProgressRecord Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_progress_record_marks_completed_near_end() {
        let record = ProgressRecord::new(MediaType::Episode, "e5", 599.0, 600.0);
        assert!(record.completed);

        let record = ProgressRecord::new(MediaType::Episode, "e5", 595.0, 600.0);
        assert!(!record.completed);
    }

    #[test]
    fn test_progress_record_zero_duration_not_completed() {
        let record = ProgressRecord::new(MediaType::Movie, "m1", 0.0, 0.0);
        assert!(!record.completed);
    }

    // -------------------------------------------------------------------------
    // EpisodeRef Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_episode_ref_display() {
        let ep = EpisodeRef {
            id: "e6".to_string(),
            season_number: 1,
            episode_number: 6,
            title: "The Next One".to_string(),
        };
        assert_eq!(ep.to_string(), "S01E06 - The Next One");
    }

    // -------------------------------------------------------------------------
    // format_duration Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_format_duration_hhmmss() {
        assert_eq!(format_duration(3661.0), "01:01:01");
        assert_eq!(format_duration(7322.0), "02:02:02");
    }

    #[test]
    fn test_format_duration_mmss() {
        assert_eq!(format_duration(125.0), "02:05");
        assert_eq!(format_duration(0.0), "00:00");
        assert_eq!(format_duration(-5.0), "00:00");
    }
}
