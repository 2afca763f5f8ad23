//! Local media adapter
//!
//! Plays streams through mpv, controlled over its JSON IPC socket. Observed
//! property changes are translated into normalized `PlayerEvent`s so the rest
//! of the engine never sees mpv's wire format.

use crate::models::PlayerEvent;

use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const SOCKET_CONNECT_ATTEMPTS: u32 = 50;
const SOCKET_CONNECT_DELAY: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum LocalPlayerError {
    #[error("mpv not found. Install mpv and ensure it is on PATH")]
    MpvNotFound,

    #[error("failed to start mpv: {0}")]
    Spawn(std::io::Error),

    #[error("mpv IPC socket did not come up: {0}")]
    Ipc(std::io::Error),

    #[error("no media loaded")]
    NotLoaded,
}

/// Local playback through an mpv subprocess
pub struct LocalMediaAdapter {
    mpv_path: String,
    process: Option<Child>,
    socket_path: PathBuf,
    cmd_tx: Option<mpsc::UnboundedSender<Value>>,
    reader_handle: Option<JoinHandle<()>>,
    writer_handle: Option<JoinHandle<()>>,
}

impl LocalMediaAdapter {
    pub fn new(mpv_path: impl Into<String>) -> Self {
        let socket_path =
            std::env::temp_dir().join(format!("castsync-mpv-{}.sock", std::process::id()));
        Self {
            mpv_path: mpv_path.into(),
            process: None,
            socket_path,
            cmd_tx: None,
            reader_handle: None,
            writer_handle: None,
        }
    }

    /// Spawn mpv on the given URL and return the normalized event stream.
    /// Any previous playback is torn down first.
    pub async fn load(
        &mut self,
        url: &str,
        start_position: f64,
    ) -> Result<mpsc::UnboundedReceiver<PlayerEvent>, LocalPlayerError> {
        self.stop().await;

        let mut cmd = Command::new(&self.mpv_path);
        cmd.arg(format!("--input-ipc-server={}", self.socket_path.display()))
            .arg("--no-terminal")
            .arg("--keep-open=no");
        if start_position >= 1.0 {
            cmd.arg(format!("--start={:.0}", start_position.round()));
        }
        cmd.arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LocalPlayerError::MpvNotFound
            } else {
                LocalPlayerError::Spawn(e)
            }
        })?;
        self.process = Some(child);

        let stream = self.connect_socket().await?;
        let (read_half, mut write_half) = stream.into_split();

        // Ask mpv to push the properties the engine cares about
        for (id, property) in [
            (1, "pause"),
            (2, "time-pos"),
            (3, "duration"),
            (4, "eof-reached"),
            (5, "paused-for-cache"),
            (6, "demuxer-cache-time"),
        ] {
            let cmd = json!({ "command": ["observe_property", id, property] });
            write_ipc_line(&mut write_half, &cmd)
                .await
                .map_err(LocalPlayerError::Ipc)?;
        }

        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Value>();
        self.cmd_tx = Some(cmd_tx);

        self.writer_handle = Some(tokio::spawn(async move {
            while let Some(cmd) = cmd_rx.recv().await {
                if let Err(e) = write_ipc_line(&mut write_half, &cmd).await {
                    tracing::debug!("mpv command write failed: {}", e);
                    break;
                }
            }
        }));

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        self.reader_handle = Some(tokio::spawn(async move {
            let mut lines = BufReader::new(read_half).lines();
            let mut translator = EventTranslator::new();

            while let Ok(Some(line)) = lines.next_line().await {
                let Ok(msg) = serde_json::from_str::<Value>(&line) else {
                    continue;
                };
                if let Some(event) = translator.translate(&msg) {
                    if event_tx.send(event).is_err() {
                        return;
                    }
                }
            }

            // Socket closed. mpv quitting without reaching EOF means the
            // stream died underneath it.
            if !translator.ended {
                let _ = event_tx.send(PlayerEvent::Errored("mpv exited".to_string()));
            }
        }));

        tracing::info!("mpv playing {}", url);
        Ok(event_rx)
    }

    pub async fn play(&self) -> Result<(), LocalPlayerError> {
        self.send(json!({ "command": ["set_property", "pause", false] }))
    }

    pub async fn pause(&self) -> Result<(), LocalPlayerError> {
        self.send(json!({ "command": ["set_property", "pause", true] }))
    }

    /// Seek to an absolute position in seconds
    pub async fn seek(&self, position: f64) -> Result<(), LocalPlayerError> {
        self.send(json!({ "command": ["seek", position.max(0.0), "absolute"] }))
    }

    /// Set volume, 0.0-1.0
    pub async fn set_volume(&self, volume: f32) -> Result<(), LocalPlayerError> {
        let volume = (volume.clamp(0.0, 1.0) * 100.0).round();
        self.send(json!({ "command": ["set_property", "volume", volume] }))
    }

    /// Tear down mpv and the IPC tasks. Safe to call when nothing is loaded.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.send(json!({ "command": ["quit"] }));
        }
        if let Some(mut child) = self.process.take() {
            // Give mpv a moment to honor quit before killing it
            let graceful =
                tokio::time::timeout(Duration::from_millis(500), child.wait()).await;
            if graceful.is_err() {
                let _ = child.kill().await;
            }
        }
        if let Some(handle) = self.writer_handle.take() {
            handle.abort();
        }
        if let Some(handle) = self.reader_handle.take() {
            handle.abort();
        }
        let _ = std::fs::remove_file(&self.socket_path);
    }

    fn send(&self, cmd: Value) -> Result<(), LocalPlayerError> {
        let tx = self.cmd_tx.as_ref().ok_or(LocalPlayerError::NotLoaded)?;
        tx.send(cmd).map_err(|_| LocalPlayerError::NotLoaded)
    }

    async fn connect_socket(&self) -> Result<UnixStream, LocalPlayerError> {
        let mut last_err = None;
        for _ in 0..SOCKET_CONNECT_ATTEMPTS {
            match UnixStream::connect(&self.socket_path).await {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    last_err = Some(e);
                    tokio::time::sleep(SOCKET_CONNECT_DELAY).await;
                }
            }
        }
        Err(LocalPlayerError::Ipc(last_err.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::TimedOut, "socket never appeared")
        })))
    }
}

impl Drop for LocalMediaAdapter {
    fn drop(&mut self) {
        if let Some(mut child) = self.process.take() {
            let _ = child.start_kill();
        }
        if let Some(handle) = self.writer_handle.take() {
            handle.abort();
        }
        if let Some(handle) = self.reader_handle.take() {
            handle.abort();
        }
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

async fn write_ipc_line(
    write_half: &mut tokio::net::unix::OwnedWriteHalf,
    cmd: &Value,
) -> std::io::Result<()> {
    let mut line = cmd.to_string();
    line.push('\n');
    write_half.write_all(line.as_bytes()).await
}

/// Translates mpv IPC messages into normalized player events
struct EventTranslator {
    buffered: f64,
    stalled: bool,
    ended: bool,
}

impl EventTranslator {
    fn new() -> Self {
        Self {
            buffered: 0.0,
            stalled: false,
            ended: false,
        }
    }

    fn translate(&mut self, msg: &Value) -> Option<PlayerEvent> {
        match msg.get("event")?.as_str()? {
            "property-change" => self.translate_property(msg),
            "end-file" => {
                let reason = msg.get("reason").and_then(Value::as_str).unwrap_or("");
                if reason == "error" {
                    self.ended = true;
                    Some(PlayerEvent::Errored("playback aborted".to_string()))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn translate_property(&mut self, msg: &Value) -> Option<PlayerEvent> {
        let name = msg.get("name")?.as_str()?;
        let data = msg.get("data");

        match name {
            "pause" => match data?.as_bool()? {
                false => Some(PlayerEvent::Started),
                true => Some(PlayerEvent::Paused),
            },
            "time-pos" => {
                let position = data?.as_f64()?;
                Some(PlayerEvent::TimeUpdated {
                    position,
                    buffered: self.buffered.max(position),
                })
            }
            "duration" => Some(PlayerEvent::MetadataLoaded {
                duration: data?.as_f64()?,
            }),
            "eof-reached" => {
                if data?.as_bool()? {
                    self.ended = true;
                    Some(PlayerEvent::Ended)
                } else {
                    None
                }
            }
            "paused-for-cache" => {
                let stalled = data?.as_bool()?;
                let was = std::mem::replace(&mut self.stalled, stalled);
                match (was, stalled) {
                    (false, true) => Some(PlayerEvent::Stalled),
                    (true, false) => Some(PlayerEvent::Started),
                    _ => None,
                }
            }
            "demuxer-cache-time" => {
                if let Some(v) = data.and_then(Value::as_f64) {
                    self.buffered = v;
                }
                None
            }
            _ => None,
        }
    }
}
