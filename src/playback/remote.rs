//! Remote session adapter
//!
//! Drives a Chromecast through the catt CLI. The receiver never pushes
//! events, so a background task polls `catt status` once a second and
//! publishes parsed snapshots on a watch channel.

use crate::models::{CastDevice, RemoteCastSession, RemoteStatus, SessionPhase};

use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// How often the receiver is polled for status
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Consecutive failed polls after which the receiver is considered gone
pub const MAX_FAILED_POLLS: u32 = 5;

#[derive(Error, Debug)]
pub enum CastError {
    #[error("catt not found. Install with: pip install catt")]
    CattNotFound,

    #[error("catt command failed: {0}")]
    CommandFailed(String),

    #[error("no active cast session")]
    NoSession,

    #[error("failed to run catt: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Seam between session logic and the catt binary, so tests can substitute
/// a scripted transport
#[async_trait]
pub trait CastTransport: Send + Sync {
    /// Run catt with the given args, returning stdout on success
    async fn run(&self, args: &[String]) -> Result<String, CastError>;
}

/// Real transport that shells out to catt
pub struct CattTransport {
    catt_path: String,
}

impl CattTransport {
    pub fn new(catt_path: impl Into<String>) -> Self {
        Self {
            catt_path: catt_path.into(),
        }
    }
}

#[async_trait]
impl CastTransport for CattTransport {
    async fn run(&self, args: &[String]) -> Result<String, CastError> {
        let output = Command::new(&self.catt_path)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    CastError::CattNotFound
                } else {
                    CastError::Spawn(e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CastError::CommandFailed(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Scan the network for cast devices
pub async fn scan_devices(transport: &dyn CastTransport) -> Result<Vec<CastDevice>, CastError> {
    let output = transport.run(&["scan".to_string()]).await?;
    Ok(CastDevice::parse_scan(&output))
}

/// One logical cast session against a named device
pub struct RemoteSessionAdapter {
    transport: Arc<dyn CastTransport>,
    device: String,
    session: Option<RemoteCastSession>,
    // Handed to the poll task when polling starts; the task dropping it
    // closes the channel, which subscribers read as the session being gone
    status_tx: Option<watch::Sender<Option<RemoteStatus>>>,
    status_rx: watch::Receiver<Option<RemoteStatus>>,
    poll_handle: Option<JoinHandle<()>>,
}

impl RemoteSessionAdapter {
    pub fn new(transport: Arc<dyn CastTransport>, device: impl Into<String>) -> Self {
        let (status_tx, status_rx) = watch::channel(None);
        Self {
            transport,
            device: device.into(),
            session: None,
            status_tx: Some(status_tx),
            status_rx,
            poll_handle: None,
        }
    }

    pub fn session(&self) -> Option<&RemoteCastSession> {
        self.session.as_ref()
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Subscribe to polled status snapshots. `None` means the receiver is
    /// unreachable or reported nothing parseable; the channel closes once
    /// the session ends or the receiver stays unreachable.
    pub fn subscribe(&self) -> watch::Receiver<Option<RemoteStatus>> {
        self.status_rx.clone()
    }

    /// Establish a session with the device. If the receiver is already
    /// playing something (started from another sender), the session adopts
    /// it instead of interrupting.
    pub async fn request_session(&mut self) -> Result<&RemoteCastSession, CastError> {
        if !self.session.as_ref().is_some_and(|s| s.is_active()) {
            let mut session = RemoteCastSession::new(&self.device);

            match self.status().await {
                Ok(Some(status)) if status.duration > 0.0 => {
                    tracing::info!(
                        "adopting existing playback on {} ({} at {:.0}s)",
                        self.device,
                        status.state,
                        status.position
                    );
                    session.phase = SessionPhase::Started;
                    session.volume = status.volume;
                }
                Ok(_) => {
                    tracing::debug!("receiver {} is idle, starting fresh session", self.device);
                }
                Err(e) => return Err(e),
            }

            self.session = Some(session);
            self.start_polling();
        }

        self.session.as_ref().ok_or(CastError::NoSession)
    }

    /// Load a stream on the receiver, optionally seeking to a resume point
    pub async fn load_media(
        &mut self,
        url: &str,
        title: &str,
        start_position: f64,
    ) -> Result<(), CastError> {
        let session = self.session.as_mut().ok_or(CastError::NoSession)?;

        let mut args = vec![
            "-d".to_string(),
            self.device.clone(),
            "cast".to_string(),
            url.to_string(),
        ];
        if start_position >= 1.0 {
            args.push("--seek-to".to_string());
            // {:.0} rounds ties to even, so round to the nearest second first
            args.push(format!("{:.0}", start_position.round()));
        }

        tracing::info!("casting '{}' to {}", title, self.device);
        self.transport.run(&args).await?;
        session.phase = SessionPhase::Started;
        Ok(())
    }

    /// Resume playback. No-op without an active session.
    pub async fn play(&self) -> Result<(), CastError> {
        self.control("play").await
    }

    /// Pause playback. No-op without an active session.
    pub async fn pause(&self) -> Result<(), CastError> {
        self.control("pause").await
    }

    /// Seek to an absolute position in seconds
    pub async fn seek(&self, position: f64) -> Result<(), CastError> {
        if !self.is_active() {
            return Ok(());
        }
        self.transport
            .run(&[
                "-d".to_string(),
                self.device.clone(),
                "seek".to_string(),
                format!("{:.0}", position.max(0.0).round()),
            ])
            .await?;
        Ok(())
    }

    /// Set receiver volume, 0.0-1.0
    pub async fn set_volume(&mut self, volume: f32) -> Result<(), CastError> {
        if !self.is_active() {
            return Ok(());
        }
        let volume = volume.clamp(0.0, 1.0);
        self.transport
            .run(&[
                "-d".to_string(),
                self.device.clone(),
                "volume".to_string(),
                format!("{:.0}", volume * 100.0),
            ])
            .await?;
        if let Some(session) = &mut self.session {
            session.volume = volume;
        }
        Ok(())
    }

    /// Stop the receiver and tear the session down. Safe to call twice.
    pub async fn end_session(&mut self) -> Result<(), CastError> {
        if let Some(handle) = self.poll_handle.take() {
            handle.abort();
        }
        self.status_tx = None;

        let Some(session) = &mut self.session else {
            return Ok(());
        };
        if session.phase == SessionPhase::Ended {
            return Ok(());
        }

        let result = self
            .transport
            .run(&[
                "-d".to_string(),
                self.device.clone(),
                "stop".to_string(),
            ])
            .await;

        session.phase = SessionPhase::Ended;

        // The receiver may already be gone; an error here is not fatal
        if let Err(e) = result {
            tracing::debug!("stop on {} failed: {}", self.device, e);
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_active())
    }

    async fn control(&self, verb: &str) -> Result<(), CastError> {
        if !self.is_active() {
            return Ok(());
        }
        self.transport
            .run(&[
                "-d".to_string(),
                self.device.clone(),
                verb.to_string(),
            ])
            .await?;
        Ok(())
    }

    async fn status(&self) -> Result<Option<RemoteStatus>, CastError> {
        let output = self
            .transport
            .run(&[
                "-d".to_string(),
                self.device.clone(),
                "status".to_string(),
            ])
            .await?;
        Ok(RemoteStatus::parse(&output))
    }

    fn start_polling(&mut self) {
        if self.poll_handle.is_some() {
            return;
        }
        let Some(status_tx) = self.status_tx.take() else {
            return;
        };

        let transport = Arc::clone(&self.transport);
        let device = self.device.clone();

        self.poll_handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(POLL_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut failed_polls = 0u32;

            loop {
                interval.tick().await;

                let args = [
                    "-d".to_string(),
                    device.clone(),
                    "status".to_string(),
                ];
                let snapshot = match transport.run(&args).await {
                    Ok(output) => RemoteStatus::parse(&output),
                    Err(e) => {
                        tracing::debug!("status poll failed for {}: {}", device, e);
                        None
                    }
                };

                // A reachable receiver always reports a state line, even when
                // idle. A run of empty polls means it dropped off the network.
                if snapshot.is_some() {
                    failed_polls = 0;
                } else {
                    failed_polls += 1;
                    if failed_polls >= MAX_FAILED_POLLS {
                        tracing::warn!(
                            "receiver {} unreachable for {} polls, giving up",
                            device,
                            failed_polls
                        );
                        break;
                    }
                }

                if status_tx.send(snapshot).is_err() {
                    break;
                }
            }
        }));
    }
}

impl Drop for RemoteSessionAdapter {
    fn drop(&mut self) {
        if let Some(handle) = self.poll_handle.take() {
            handle.abort();
        }
    }
}
